//! Launch configuration shared by the launcher, runner and readers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::JobId;

/// Group used when none is configured.
pub const DEFAULT_GROUP: &str = "default";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a job group.
///
/// The serializable part is written into every store document as the
/// `config` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory holding lock, store and log files.
    pub work_dir: PathBuf,
    /// Job group; parallelism is accounted per group.
    pub group: String,
    /// Maximum number of running jobs in the group, 0 for unlimited.
    pub parallel: u32,
    /// Records launched more than this many seconds ago are purged on the
    /// next store write, whether or not they finished. 0 disables purging.
    pub clean_up_second: u64,
    /// Executable re-invoked as the detached runner. Defaults to the current
    /// executable.
    #[serde(skip)]
    pub runner_program: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("jobrunner"),
            group: DEFAULT_GROUP.to_string(),
            parallel: 1,
            clean_up_second: 30 * 60,
            runner_program: None,
        }
    }
}

impl RunnerConfig {
    /// Create a config rooted at the given work directory.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Set the job group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the parallelism cap.
    pub fn with_parallel(mut self, parallel: u32) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the retention window.
    pub fn with_clean_up_second(mut self, clean_up_second: u64) -> Self {
        self.clean_up_second = clean_up_second;
        self
    }

    /// Set the executable spawned as the runner.
    pub fn with_runner_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.runner_program = Some(program.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `JOBRUNNER_WORK_DIR` (default: `<temp dir>/jobrunner`)
    /// - `JOBRUNNER_GROUP` (default: `default`)
    /// - `JOBRUNNER_PARALLEL` (default: 1, 0 = unlimited)
    /// - `JOBRUNNER_CLEAN_UP_SECOND` (default: 1800, 0 = never)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).and_then(non_empty);
        let mut cfg = Self::default();

        if let Some(dir) = var("JOBRUNNER_WORK_DIR") {
            cfg.work_dir = PathBuf::from(dir);
        }
        if let Some(group) = var("JOBRUNNER_GROUP") {
            cfg.group = group;
        }
        if let Some(parallel) = var("JOBRUNNER_PARALLEL") {
            cfg.parallel = parse_number("JOBRUNNER_PARALLEL", &parallel)?;
        }
        if let Some(secs) = var("JOBRUNNER_CLEAN_UP_SECOND") {
            cfg.clean_up_second = parse_number("JOBRUNNER_CLEAN_UP_SECOND", &secs)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject group names that cannot be used as file names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group.is_empty() {
            return Err(ConfigError::Invalid("group must not be empty".into()));
        }
        if self.group.contains(['/', '\\']) || self.group == "." || self.group == ".." {
            return Err(ConfigError::Invalid(format!(
                "group {:?} is not a valid file name",
                self.group
            )));
        }
        Ok(())
    }

    /// Whether a parallelism cap is in force.
    pub fn is_limited(&self) -> bool {
        self.parallel > 0
    }

    /// Whether the retention sweep runs on store writes.
    pub fn retention_enabled(&self) -> bool {
        self.clean_up_second > 0
    }

    /// `<work_dir>/<group>.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.lock", self.group))
    }

    /// `<work_dir>/<group>.json`
    pub fn store_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.json", self.group))
    }

    /// `<work_dir>/<group>.runner.log`, where detached runners write their
    /// own diagnostics.
    pub fn runner_log_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.runner.log", self.group))
    }

    /// `<work_dir>/<job_id>.log`
    pub fn log_path(&self, job_id: &JobId) -> PathBuf {
        self.work_dir.join(format!("{job_id}.log"))
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::Invalid(format!("{name}={raw} is not a valid number")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RunnerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.group, "default");
        assert_eq!(cfg.parallel, 1);
        assert_eq!(cfg.clean_up_second, 1800);
        assert!(cfg.work_dir.ends_with("jobrunner"));
    }

    #[test]
    fn env_overrides_and_blank_values() {
        let cfg = RunnerConfig::from_lookup(lookup(&[
            ("JOBRUNNER_WORK_DIR", "/var/tmp/jobs"),
            ("JOBRUNNER_GROUP", "batch"),
            ("JOBRUNNER_PARALLEL", "0"),
            ("JOBRUNNER_CLEAN_UP_SECOND", "  "),
        ]))
        .unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/var/tmp/jobs"));
        assert_eq!(cfg.store_path(), PathBuf::from("/var/tmp/jobs/batch.json"));
        assert_eq!(cfg.lock_path(), PathBuf::from("/var/tmp/jobs/batch.lock"));
        assert_eq!(
            cfg.runner_log_path(),
            PathBuf::from("/var/tmp/jobs/batch.runner.log")
        );
        assert!(!cfg.is_limited());
        assert_eq!(cfg.clean_up_second, 1800);
    }

    #[test]
    fn rejects_bad_numbers_and_groups() {
        let err = RunnerConfig::from_lookup(lookup(&[("JOBRUNNER_PARALLEL", "many")]));
        assert!(matches!(err, Err(ConfigError::Invalid(_))));

        let err = RunnerConfig::from_lookup(lookup(&[("JOBRUNNER_GROUP", "../etc")]));
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn snapshot_uses_wire_keys_and_skips_runner_program() {
        let cfg = RunnerConfig::new("/w").with_runner_program("/bin/true");
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "work_dir": "/w",
                "group": "default",
                "parallel": 1,
                "clean_up_second": 1800,
            })
        );
    }
}
