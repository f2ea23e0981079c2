//! mergerefs - replay merged ref scenarios
//!
//! Runs scenario files against the simulated host and reports which
//! assertions failed. Settings come from `mergerefs.toml` and can be
//! overridden on the command line.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::MergeRefsConfig;

/// Replay merged ref scenarios against a simulated host
#[derive(Parser, Debug)]
#[command(name = "mergerefs")]
#[command(about = "Replay merged ref scenarios against a simulated host")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scenario files
    Run {
        /// Scenario JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Config file or directory holding mergerefs.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write one JSON report per scenario into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Stop at the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Parse scenario files without running them
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write a default mergerefs.toml
    Init {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            files,
            config,
            report_dir,
            fail_fast,
        } => {
            let file_config = MergeRefsConfig::load(config.as_deref())?;
            init_tracing(&file_config.log.filter);

            let mut harness = file_config.harness_config();
            harness.fail_fast |= fail_fast;
            let report_dir = report_dir.or(file_config.run.report_dir);

            if !commands::run(&files, harness, report_dir.as_deref())? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Check { files } => {
            init_tracing("warn");
            commands::check(&files)?;
        }
        Commands::Init { dir } => {
            init_tracing("info");
            let path = commands::init(&dir)?;
            tracing::info!("Created {}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
