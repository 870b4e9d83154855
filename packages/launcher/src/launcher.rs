//! Launching detached jobs.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use jobs_core::{JobId, JobRecord, RunnerConfig};
use store::{JobStore, LockPolicy};

use crate::LaunchError;
use crate::command::command_line;
use crate::status::StatusReader;

/// Hidden subcommand the runner program is re-invoked with.
pub const RUNNER_SUBCOMMAND: &str = "__run";

/// Starts commands in detached runner processes and records them in the
/// group's store.
#[derive(Debug, Clone)]
pub struct Launcher {
    store: JobStore,
}

impl Launcher {
    /// Create a launcher. A relative work directory is resolved against the
    /// current directory so that recorded log paths are absolute.
    pub fn new(mut config: RunnerConfig) -> Result<Self, LaunchError> {
        config.validate()?;
        config.work_dir = std::path::absolute(&config.work_dir)?;
        Ok(Self {
            store: JobStore::new(config),
        })
    }

    /// Set the lock retry policy.
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.store = self.store.with_lock_policy(policy);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        self.store.config()
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// A status reader over the same group.
    pub fn reader(&self) -> StatusReader {
        StatusReader::from_store(self.store.clone())
    }

    /// Launch `cmd` with `params` and return the new job's id.
    ///
    /// The group lock is held from the parallelism check until the record is
    /// written, so concurrent launches cannot both pass the check.
    pub async fn run<S: AsRef<str>>(&self, cmd: &str, params: &[S]) -> Result<JobId, LaunchError> {
        let config = self.store.config();
        tokio::fs::create_dir_all(&config.work_dir).await?;

        let job_id = JobId::new();
        let group_lock = self.store.lock_group().await?;

        let doc = self.store.load().await?;
        if config.is_limited() {
            let running = doc.running_count();
            if running >= config.parallel as usize {
                tracing::info!(
                    "Rejected launch in group {}: {} of {} running",
                    config.group,
                    running,
                    config.parallel
                );
                return Err(LaunchError::ParallelLimitExceeded { running });
            }
        }

        let cmd_line = command_line(cmd, params)?;
        let log = config.log_path(&job_id);
        let pid = self.spawn_runner(&job_id).await?;

        self.store
            .update(&job_id, JobRecord::new(cmd_line.clone(), log, pid))
            .await?;
        group_lock.release();

        tracing::info!("Launched job {} (pid {}): {}", job_id, pid, cmd_line);
        Ok(job_id)
    }

    fn runner_program(&self) -> Result<PathBuf, LaunchError> {
        match &self.store.config().runner_program {
            Some(program) => Ok(program.clone()),
            None => Ok(std::env::current_exe()?),
        }
    }

    /// Spawn the runner in its own process group, detached from our stdio,
    /// and return its pid. Its stdout and stderr are appended to the group's
    /// runner log.
    async fn spawn_runner(&self, job_id: &JobId) -> Result<u32, LaunchError> {
        let config = self.store.config();
        let stdout = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.runner_log_path())
            .await?
            .into_std()
            .await;
        let stderr = stdout.try_clone()?;

        let mut command = std::process::Command::new(self.runner_program()?);
        command
            .args(runner_args(config, job_id))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        // Dropping the handle leaves the process running; tokio reaps it.
        let child = tokio::process::Command::from(command)
            .spawn()
            .map_err(LaunchError::Spawn)?;
        child.id().ok_or(LaunchError::MissingPid)
    }
}

/// Arguments the runner program is re-invoked with:
/// `__run --work-dir <dir> -- <group> <job_id>`.
pub fn runner_args(config: &RunnerConfig, job_id: &JobId) -> Vec<OsString> {
    vec![
        RUNNER_SUBCOMMAND.into(),
        "--work-dir".into(),
        config.work_dir.clone().into_os_string(),
        "--".into(),
        config.group.clone().into(),
        job_id.to_string().into(),
    ]
}
