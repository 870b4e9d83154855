use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use jobs_core::{JobId, RunnerConfig};
use launcher::{Launcher, Runner, StatusReader};

/// Launch shell commands in the background and poll them later.
#[derive(Debug, Parser)]
#[command(name = "jobrunner", version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for the `JOBRUNNER_*` environment variables.
#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(long)]
    work_dir: Option<PathBuf>,
    #[arg(long)]
    group: Option<String>,
    /// Maximum running jobs in the group, 0 for unlimited.
    #[arg(long)]
    parallel: Option<u32>,
    /// Purge records launched more than this many seconds ago, 0 to keep forever.
    #[arg(long)]
    clean_up_second: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Launch a command and print its job id.
    Run {
        cmd: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print `<state> <code>` for a job.
    Status { job_id: JobId },
    /// Print a job's output from a byte offset.
    Log {
        job_id: JobId,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// List the jobs recorded in the group.
    List,
    #[command(name = "__run", hide = true)]
    Exec {
        #[arg(long)]
        work_dir: PathBuf,
        group: String,
        job_id: JobId,
    },
}

impl ConfigArgs {
    fn resolve(self) -> anyhow::Result<RunnerConfig> {
        let mut config = RunnerConfig::from_env().context("reading JOBRUNNER_* environment")?;
        if let Some(work_dir) = self.work_dir {
            config.work_dir = work_dir;
        }
        if let Some(group) = self.group {
            config.group = group;
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if let Some(secs) = self.clean_up_second {
            config.clean_up_second = secs;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    match cli.command {
        Command::Exec {
            work_dir,
            group,
            job_id,
        } => {
            Runner::new(work_dir, group)?
                .execute(&job_id)
                .await
                .with_context(|| format!("running job {job_id}"))?;
        }
        Command::Run { cmd, args } => {
            let launcher = Launcher::new(cli.config.resolve()?)?;
            let job_id = launcher.run(&cmd, &args).await?;
            println!("{job_id}");
        }
        Command::Status { job_id } => {
            let report = StatusReader::new(cli.config.resolve()?).status(&job_id).await?;
            println!("{} {}", report.state, report.code);
        }
        Command::Log { job_id, offset } => {
            let bytes = StatusReader::new(cli.config.resolve()?)
                .log(&job_id, offset)
                .await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
        Command::List => {
            let reader = StatusReader::new(cli.config.resolve()?);
            for (job_id, record) in reader.jobs().await? {
                let code = record
                    .state
                    .code()
                    .map_or_else(|| "-".to_string(), |c| c.to_string());
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    job_id,
                    if record.state.is_running() { "running" } else { "complete" },
                    code,
                    record.start_at.format("%Y-%m-%d %H:%M:%S"),
                    record.cmd
                );
            }
        }
    }

    Ok(())
}
