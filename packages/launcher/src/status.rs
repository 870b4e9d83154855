//! Read-only job queries.

use std::io::SeekFrom;

use jobs_core::{JobId, JobRecord, RunnerConfig, StatusReport};
use store::{JobStore, StoreError};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Polls job state and output. Never sweeps or writes the store.
#[derive(Debug, Clone)]
pub struct StatusReader {
    store: JobStore,
}

impl StatusReader {
    pub fn new(config: RunnerConfig) -> Self {
        Self::from_store(JobStore::new(config))
    }

    pub fn from_store(store: JobStore) -> Self {
        Self { store }
    }

    /// Current state of a job. Unknown and cleaned-up jobs both report
    /// `NotFound`.
    pub async fn status(&self, job_id: &JobId) -> Result<StatusReport, StoreError> {
        let doc = self.store.load().await?;
        Ok(doc
            .get(job_id)
            .map(StatusReport::from)
            .unwrap_or_else(StatusReport::not_found))
    }

    /// Log bytes from `offset` to the current end of file.
    ///
    /// Returns nothing for unknown jobs, missing log files and offsets past
    /// the end. The log is read without locking while the job may still be
    /// writing to it.
    pub async fn log(&self, job_id: &JobId, offset: u64) -> Result<Vec<u8>, StoreError> {
        let doc = self.store.load().await?;
        let Some(record) = doc.get(job_id) else {
            return Ok(Vec::new());
        };

        let mut file = match tokio::fs::File::open(&record.log).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// All records of the group, ordered by job id.
    pub async fn jobs(&self) -> Result<Vec<(String, JobRecord)>, StoreError> {
        Ok(self.store.load().await?.jobs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use std::error::Error;

    use jobs_core::JobStatus;

    use super::*;

    #[tokio::test]
    async fn unknown_jobs_are_not_found_and_have_no_log() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let reader = StatusReader::new(RunnerConfig::new(dir.path()));
        let job_id = JobId::new();

        assert_eq!(reader.status(&job_id).await?, StatusReport::not_found());
        assert!(reader.log(&job_id, 0).await?.is_empty());
        assert!(reader.jobs().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn log_reads_from_offset() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let config = RunnerConfig::new(dir.path());
        let store = JobStore::new(config.clone());
        let reader = StatusReader::new(config.clone());

        let job_id = JobId::new();
        let log = config.log_path(&job_id);
        store.update(&job_id, JobRecord::new("echo", &log, 1)).await?;

        // Record exists but the runner has not created the log yet.
        assert!(reader.log(&job_id, 0).await?.is_empty());
        assert_eq!(reader.status(&job_id).await?.state, JobStatus::Running);

        tokio::fs::write(&log, b"hello ").await?;
        let head = reader.log(&job_id, 0).await?;
        assert_eq!(head, b"hello ");

        tokio::fs::write(&log, b"hello world").await?;
        assert_eq!(reader.log(&job_id, head.len() as u64).await?, b"world");
        assert!(reader.log(&job_id, 11).await?.is_empty());
        assert!(reader.log(&job_id, 4096).await?.is_empty());

        let listed = reader.jobs().await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, job_id.to_string());
        Ok(())
    }
}
