//! Retention sweep for old job records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use jobs_core::JobRecord;

/// Drop records launched more than `max_age_secs` before `now`, deleting
/// their log files. Jobs that are still running are dropped as well.
///
/// A log file that is already gone is not an error. Other deletion failures
/// are logged and the record is dropped anyway.
pub async fn sweep(
    jobs: BTreeMap<String, JobRecord>,
    max_age_secs: u64,
    now: DateTime<Utc>,
) -> BTreeMap<String, JobRecord> {
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    let mut kept = BTreeMap::new();

    for (job_id, job) in jobs {
        if job.age_secs(now) <= max_age {
            kept.insert(job_id, job);
            continue;
        }

        match tokio::fs::remove_file(&job.log).await {
            Ok(()) => tracing::debug!("Removed log {:?} of expired job {}", job.log, job_id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove log {:?} of job {}: {}", job.log, job_id, e),
        }
        tracing::info!("Cleaned up job {}", job_id);
    }

    kept
}
