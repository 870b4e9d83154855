//! The detached runner: executes one job and reports its exit code.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use jobs_core::{JobId, JobRecord, RunnerConfig, StoreDocument};
use store::{JobStore, StoreError};
use tokio::time::Instant;

use crate::LaunchError;

/// How long the runner waits for the launcher to commit its record.
const RECORD_WAIT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Whole-operation retries for the completion write.
const COMMIT_ATTEMPTS: u32 = 250;

/// Executes a launched job in the runner process.
#[derive(Debug, Clone)]
pub struct Runner {
    store: JobStore,
    record_wait: Duration,
}

impl Runner {
    pub fn new(work_dir: impl Into<PathBuf>, group: impl Into<String>) -> Result<Self, LaunchError> {
        let config = RunnerConfig::new(work_dir).with_group(group);
        config.validate()?;
        Ok(Self {
            store: JobStore::new(config),
            record_wait: RECORD_WAIT,
        })
    }

    /// Set how long to wait for the job's record to appear.
    pub fn with_record_wait(mut self, wait: Duration) -> Self {
        self.record_wait = wait;
        self
    }

    /// Run the job's command with output sent to its log file, then merge the
    /// exit code into its record. Returns the exit code.
    pub async fn execute(&self, job_id: &JobId) -> Result<i32, LaunchError> {
        let (doc, record) = self.wait_for_record(job_id).await?;
        let store = self.store_for(&doc);

        tracing::info!("Running job {}: {}", job_id, record.cmd);
        let code = run_command(&record).await?;
        tracing::info!("Job {} exited with {}", job_id, code);

        commit(&store, job_id, code).await?;
        Ok(code)
    }

    /// The launcher spawns us before it writes the record, so poll for it.
    async fn wait_for_record(
        &self,
        job_id: &JobId,
    ) -> Result<(StoreDocument, JobRecord), LaunchError> {
        let deadline = Instant::now() + self.record_wait;
        loop {
            match self.store.load().await {
                Ok(doc) => {
                    if let Some(record) = doc.get(job_id).cloned() {
                        return Ok((doc, record));
                    }
                }
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Err(LaunchError::JobNotFound(*job_id));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// A store using the launcher's config snapshot, so the completion write
    /// applies the same retention window.
    fn store_for(&self, doc: &StoreDocument) -> JobStore {
        let own = self.store.config();
        let config = match &doc.config {
            Some(snapshot) => RunnerConfig {
                work_dir: own.work_dir.clone(),
                group: own.group.clone(),
                ..snapshot.clone()
            },
            None => own.clone(),
        };
        JobStore::new(config).with_lock_policy(self.store.lock_policy())
    }
}

async fn run_command(record: &JobRecord) -> Result<i32, LaunchError> {
    let stdout = tokio::fs::File::create(&record.log).await?.into_std().await;
    let stderr = stdout.try_clone()?;

    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&record.cmd)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .status()
        .await
        .map_err(LaunchError::Spawn)?;

    Ok(exit_code(status))
}

/// Exit code of a finished command; death by signal maps to `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

async fn commit(store: &JobStore, job_id: &JobId, code: i32) -> Result<(), StoreError> {
    let mut attempt = 1;
    loop {
        match store.complete(job_id, code).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_transient() && attempt < COMMIT_ATTEMPTS => {
                tracing::warn!("Retrying completion of job {}: {}", job_id, e);
                attempt += 1;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Err(e) => return Err(e),
        }
    }
}
