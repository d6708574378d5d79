//! Maglev - deploy train for green CI builds
//!
//! The `maglev` command runs the deploy bundle pipeline once and exits.
//!
//! ## Commands
//!
//! - `run`: promote the newest fast-forward build and report to Slack
//! - `config`: print the resolved configuration with secrets redacted
//!
//! ## Exit codes
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | deployed everywhere, or nothing to deploy |
//! | 1 | startup error, initial fetch failed, or the report could not be posted |
//! | 2 | deployment failed on at least one target |
//! | 3 | a deployment is already in progress |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use maglev_clients::Collaborators;
use maglev_core::{MaglevConfig, Pipeline, PipelineSettings};

#[derive(Parser)]
#[command(name = "maglev")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Promote the newest safe CI build to the deployment targets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Load environment variables from this file instead of `./.env`
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deploy pipeline once
    Run {
        /// Go through every step but never trigger a build
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the resolved configuration as JSON (tokens redacted)
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!(error = %format!("{:#}", err), "maglev failed");
            eprintln!("maglev: {:#}", err);
            ExitCode::from(1)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    load_env_file(cli.env_file.as_deref())?;

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    // Resolve before tracing so `MAGLEV_LOG_FORMAT` applies.
    let config = MaglevConfig::from_env();
    maglev_core::init_tracing(json_logs(cli.json, config.as_ref().ok()), level);
    let config = config.context("Failed to load configuration")?;

    match cli.command {
        Commands::Run { dry_run } => cmd_run(config, dry_run).await,
        Commands::Config => cmd_config(&config),
    }
}

/// `--env-file` must exist; the default `.env` is optional.
fn load_env_file(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

fn json_logs(flag: bool, config: Option<&MaglevConfig>) -> bool {
    flag || config.is_some_and(|c| c.log_format.is_json())
}

async fn cmd_run(mut config: MaglevConfig, dry_run: bool) -> Result<u8> {
    config.dry_run |= dry_run;

    let collaborators =
        Collaborators::from_config(&config).context("Failed to build HTTP clients")?;
    let pipeline = Pipeline::new(
        collaborators.ci,
        collaborators.scm,
        collaborators.target,
        collaborators.sink,
        PipelineSettings::from_config(&config),
    );

    let report = pipeline.run().await;
    info!(
        run_id = %report.run_id,
        outcome = report.outcome.label(),
        bundle_failures = report.bundle_failures.len(),
        duration_ms = report.duration_ms,
        "run complete"
    );
    for failure in &report.bundle_failures {
        info!(candidate_id = %failure.candidate_id(), reason = %failure, "candidate skipped");
    }

    Ok(exit_code(report.exit_code()))
}

fn cmd_config(config: &MaglevConfig) -> Result<u8> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(0)
}

fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
