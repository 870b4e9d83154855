//! The per-group job store.

use std::path::{Path, PathBuf};

use chrono::Utc;
use jobs_core::{JobId, JobRecord, JobState, RunnerConfig, StoreDocument};

use crate::lock::{LockMode, LockPolicy, LockedFile};
use crate::retention::sweep;
use crate::StoreError;

/// Read/modify/write access to `<work_dir>/<group>.json`.
///
/// Every access holds an exclusive lock on the store file for its whole
/// critical section, so writers are totally ordered and readers never see a
/// partially written document.
#[derive(Debug, Clone)]
pub struct JobStore {
    config: RunnerConfig,
    policy: LockPolicy,
}

impl JobStore {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            policy: LockPolicy::default(),
        }
    }

    /// Set the lock retry policy.
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.policy
    }

    pub fn path(&self) -> PathBuf {
        self.config.store_path()
    }

    /// Take the group lock (`<group>.lock`).
    ///
    /// Held by the launcher across its check-then-write sequence.
    pub async fn lock_group(&self) -> Result<LockedFile, StoreError> {
        LockedFile::acquire(self.config.lock_path(), LockMode::ReadWrite, self.policy).await
    }

    /// Load the document. A missing store file reads as an empty document and
    /// is not created.
    pub async fn load(&self) -> Result<StoreDocument, StoreError> {
        let path = self.path();
        let mut file = match LockedFile::acquire(&path, LockMode::Read, self.policy).await {
            Ok(file) => file,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreDocument::default());
            }
            Err(e) => return Err(e),
        };
        let bytes = file.read_all().await?;
        file.release();
        parse_document(&path, &bytes)
    }

    /// Number of jobs in the group that have not reported an exit code.
    pub async fn running_count(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.running_count())
    }

    /// Write `record` under `job_id`, replacing any previous record.
    pub async fn update(
        &self,
        job_id: &JobId,
        record: JobRecord,
    ) -> Result<StoreDocument, StoreError> {
        self.modify(|doc| {
            doc.insert(job_id, record);
            Ok(())
        })
        .await
    }

    /// Merge an exit code into an existing record, keeping its other fields.
    pub async fn complete(&self, job_id: &JobId, code: i32) -> Result<StoreDocument, StoreError> {
        self.modify(|doc| {
            let record = doc
                .get_mut(job_id)
                .ok_or(StoreError::MissingJob(*job_id))?;
            record.state = JobState::Complete(code);
            Ok(())
        })
        .await
    }

    /// Run a read-modify-write cycle on the document.
    ///
    /// The config snapshot is refreshed and, when retention is enabled, old
    /// records are swept before the file is rewritten. A store that fails to
    /// parse is left untouched.
    pub async fn modify<F>(&self, apply: F) -> Result<StoreDocument, StoreError>
    where
        F: FnOnce(&mut StoreDocument) -> Result<(), StoreError>,
    {
        let path = self.path();
        let mut file = LockedFile::acquire(&path, LockMode::ReadWrite, self.policy).await?;
        let bytes = file.read_all().await?;
        let mut doc = parse_document(&path, &bytes)?;

        doc.config = Some(self.config.clone());
        apply(&mut doc)?;

        if self.config.retention_enabled() {
            let jobs = std::mem::take(&mut doc.jobs);
            doc.jobs = sweep(jobs, self.config.clean_up_second, Utc::now()).await;
        }

        let data = serde_json::to_vec(&doc)?;
        file.replace(&data).await?;
        file.release();

        tracing::debug!("Wrote {} job(s) to {:?}", doc.len(), path);
        Ok(doc)
    }
}

/// Parse store content; blank content is an empty document.
pub fn parse_document(path: &Path, bytes: &[u8]) -> Result<StoreDocument, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(StoreDocument::default());
    }
    serde_json::from_slice(bytes).map_err(|source| {
        tracing::error!("Refusing to use corrupt store {:?}: {}", path, source);
        StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    })
}
