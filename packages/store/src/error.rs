use std::path::PathBuf;

use jobs_core::JobId;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("couldn't lock {} after {attempts} attempts", .path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("store {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("job {0} not found in store")]
    MissingJob(JobId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::LockTimeout { .. })
    }
}
