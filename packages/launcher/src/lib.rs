//! Fire-and-forget job launching with poll-later status.
//!
//! # Architecture
//!
//! - `Launcher` - checks the group's parallelism cap, spawns a detached
//!   runner and records the job
//! - `Runner` - runs inside the detached process, executes the command and
//!   writes its exit code back
//! - `StatusReader` - read-only state and log queries
//!
//! # Usage
//!
//! ```ignore
//! use jobs_core::RunnerConfig;
//! use launcher::Launcher;
//!
//! let launcher = Launcher::new(RunnerConfig::new("/tmp/jobrunner"))?;
//! let job_id = launcher.run("./sample.sh", &["1"]).await?;
//! let status = launcher.reader().status(&job_id).await?;
//! ```

mod command;
mod error;
mod launcher;
mod runner;
mod status;

pub use command::command_line;
pub use error::LaunchError;
pub use launcher::{Launcher, RUNNER_SUBCOMMAND, runner_args};
pub use runner::Runner;
pub use status::StatusReader;
