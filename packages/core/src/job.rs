//! Job domain types for launched commands.

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Execution state of a job.
///
/// On disk this is encoded by the presence of `retCode`: a record without it
/// is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobState {
    #[default]
    Running,
    Complete(i32),
}

impl JobState {
    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running)
    }

    /// Exit code of the command, if it has finished.
    pub fn code(&self) -> Option<i32> {
        match self {
            JobState::Running => None,
            JobState::Complete(code) => Some(*code),
        }
    }
}

/// Persisted metadata for one launched command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// The assembled, shell-escaped command line.
    pub cmd: String,
    /// Absolute path of the job's output file.
    pub log: PathBuf,
    /// Launch time, second precision.
    #[serde(rename = "startAt", with = "start_at_format")]
    pub start_at: DateTime<Utc>,
    /// Process id of the detached runner.
    pub pid: u32,
    #[serde(
        rename = "retCode",
        default,
        skip_serializing_if = "JobState::is_running",
        with = "ret_code_format"
    )]
    pub state: JobState,
}

impl JobRecord {
    /// Create a running record stamped with the current time.
    pub fn new(cmd: impl Into<String>, log: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            cmd: cmd.into(),
            log: log.into(),
            start_at: Utc::now().trunc_subsecs(0),
            pid,
            state: JobState::Running,
        }
    }

    /// Override the launch time.
    pub fn with_start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = start_at.trunc_subsecs(0);
        self
    }

    /// Mark the record complete with the command's exit code.
    pub fn complete(mut self, code: i32) -> Self {
        self.state = JobState::Complete(code);
        self
    }

    /// Seconds elapsed since launch, relative to `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_at).num_seconds()
    }
}

/// Externally visible job state as reported to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The job never existed or has been cleaned up.
    NotFound,
    Running,
    Complete,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotFound => "not found",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a status poll: the state and the exit code (0 unless complete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: JobStatus,
    pub code: i32,
}

impl StatusReport {
    pub fn not_found() -> Self {
        Self {
            state: JobStatus::NotFound,
            code: 0,
        }
    }
}

impl From<&JobRecord> for StatusReport {
    fn from(record: &JobRecord) -> Self {
        match record.state {
            JobState::Running => Self {
                state: JobStatus::Running,
                code: 0,
            },
            JobState::Complete(code) => Self {
                state: JobStatus::Complete,
                code,
            },
        }
    }
}

mod start_at_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

mod ret_code_format {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::JobState;

    pub fn serialize<S: Serializer>(value: &JobState, s: S) -> Result<S::Ok, S::Error> {
        match value {
            JobState::Complete(code) => s.serialize_i32(*code),
            JobState::Running => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<JobState, D::Error> {
        Ok(match Option::<i32>::deserialize(d)? {
            Some(code) => JobState::Complete(code),
            None => JobState::Running,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn running_record_omits_ret_code() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let record = JobRecord::new("sleep '1'", "/tmp/jobrunner/a.log", 42).with_start_at(start);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "cmd": "sleep '1'",
                "log": "/tmp/jobrunner/a.log",
                "startAt": "2024-03-01 12:30:05",
                "pid": 42,
            })
        );
    }

    #[test]
    fn ret_code_presence_drives_state() {
        let complete: JobRecord = serde_json::from_value(json!({
            "cmd": "false",
            "log": "/tmp/x.log",
            "startAt": "2024-03-01 12:30:05",
            "pid": 7,
            "retCode": 1,
        }))
        .unwrap();
        assert_eq!(complete.state, JobState::Complete(1));
        assert_eq!(serde_json::to_value(&complete).unwrap()["retCode"], json!(1));

        let null_code: JobRecord = serde_json::from_value(json!({
            "cmd": "true",
            "log": "/tmp/x.log",
            "startAt": "2024-03-01 12:30:05",
            "pid": 7,
            "retCode": null,
        }))
        .unwrap();
        assert!(null_code.state.is_running());
    }

    #[test]
    fn start_at_is_truncated_to_seconds() {
        let record = JobRecord::new("true", "/tmp/x.log", 1);
        assert_eq!(record.start_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn status_report_from_record() {
        let record = JobRecord::new("true", "/tmp/x.log", 1);
        assert_eq!(
            StatusReport::from(&record),
            StatusReport {
                state: JobStatus::Running,
                code: 0
            }
        );

        let done = record.complete(3);
        assert_eq!(
            StatusReport::from(&done),
            StatusReport {
                state: JobStatus::Complete,
                code: 3
            }
        );
        assert_eq!(StatusReport::not_found().state.as_str(), "not found");
    }

    #[test]
    fn job_ids_are_distinct_and_parse_back() {
        let ids: Vec<JobId> = (0..256).map(|_| JobId::new()).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());

        let parsed = JobId::parse(&ids[0].to_string()).unwrap();
        assert_eq!(parsed, ids[0]);
        assert!(JobId::parse("not-a-ulid").is_err());
    }
}
