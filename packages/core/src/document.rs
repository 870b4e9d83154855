//! The per-group store document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{JobId, JobRecord, RunnerConfig};

/// `{ config, jobs: { jobId -> JobRecord } }` as persisted in `<group>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDocument {
    /// Snapshot of the configuration of the last writer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<RunnerConfig>,
    /// Records keyed by job id.
    pub jobs: BTreeMap<String, JobRecord>,
}

impl StoreDocument {
    pub fn get(&self, job_id: &JobId) -> Option<&JobRecord> {
        self.jobs.get(&job_id.to_string())
    }

    pub fn get_mut(&mut self, job_id: &JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(&job_id.to_string())
    }

    pub fn insert(&mut self, job_id: &JobId, record: JobRecord) -> Option<JobRecord> {
        self.jobs.insert(job_id.to_string(), record)
    }

    /// Number of records without an exit code.
    pub fn running_count(&self) -> usize {
        self.jobs.values().filter(|job| job.state.is_running()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn missing_sections_default() {
        let doc: StoreDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.is_empty());
        assert!(doc.config.is_none());
    }

    #[test]
    fn running_count_ignores_completed() {
        let mut doc = StoreDocument::default();
        doc.insert(&JobId::new(), JobRecord::new("a", "/tmp/a.log", 1));
        doc.insert(&JobId::new(), JobRecord::new("b", "/tmp/b.log", 2).complete(0));
        doc.insert(&JobId::new(), JobRecord::new("c", "/tmp/c.log", 3));
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.running_count(), 2);
    }
}
