use jobs_core::{ConfigError, JobId};
use store::StoreError;
use thiserror::Error;

/// Launch and runner errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Parallel job limit exceeded, running: {running}")]
    ParallelLimitExceeded { running: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("spawned runner reported no pid")]
    MissingPid,

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
