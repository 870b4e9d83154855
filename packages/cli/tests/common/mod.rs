use std::path::Path;
use std::time::Duration;

use jobs_core::{JobId, JobStatus, RunnerConfig, StatusReport};
use launcher::{LaunchError, Launcher};
use tokio::time::Instant;

pub const BIN: &str = env!("CARGO_BIN_EXE_jobrunner");

/// A config whose runner is the real `jobrunner` binary.
pub fn config(work_dir: &Path) -> RunnerConfig {
    RunnerConfig::new(work_dir).with_runner_program(BIN)
}

pub fn launcher(work_dir: &Path, parallel: u32) -> Result<Launcher, LaunchError> {
    Launcher::new(config(work_dir).with_parallel(parallel))
}

/// Poll until the job leaves the running state.
pub async fn wait_for_completion(
    launcher: &Launcher,
    job_id: &JobId,
    timeout: Duration,
) -> Result<StatusReport, Box<dyn std::error::Error>> {
    let deadline = Instant::now() + timeout;
    loop {
        let report = launcher.reader().status(job_id).await?;
        if report.state != JobStatus::Running {
            return Ok(report);
        }
        if Instant::now() >= deadline {
            return Err(format!("job {job_id} still running after {timeout:?}").into());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
