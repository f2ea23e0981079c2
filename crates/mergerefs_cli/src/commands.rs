//! Subcommand implementations

use anyhow::{Context, Result};
use mergerefs_harness::{run_loaded_scenario, HarnessConfig, HarnessReport, Scenario};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{MergeRefsConfig, CONFIG_FILE};

/// Run scenario files; returns whether every file passed
pub fn run(files: &[PathBuf], config: HarnessConfig, report_dir: Option<&Path>) -> Result<bool> {
    let mut failures = 0usize;
    for file in files {
        let scenario = Scenario::from_path(file)
            .with_context(|| format!("Failed to load {}", file.display()))?;
        let outcome = run_loaded_scenario(&scenario, config)
            .with_context(|| format!("Failed to run {}", file.display()))?;
        let report = outcome.report();

        print_summary(file, report);
        if let Some(dir) = report_dir {
            write_report(dir, file, report)?;
        }

        if outcome.is_failed() {
            failures += 1;
            if config.fail_fast {
                break;
            }
        }
    }

    tracing::info!(files = files.len(), failures, "scenario run finished");
    Ok(failures == 0)
}

/// Parse scenario files without running them
pub fn check(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let scenario = Scenario::from_path(file)
            .with_context(|| format!("Failed to parse {}", file.display()))?;
        println!("ok    {} ({} steps)", file.display(), scenario.steps.len());
    }
    Ok(())
}

/// Write a default mergerefs.toml into `dir`
pub fn init(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    fs::create_dir_all(dir)?;
    fs::write(&path, MergeRefsConfig::default().to_toml()?)?;
    Ok(path)
}

fn print_summary(file: &Path, report: &HarnessReport) {
    if report.is_passed() {
        println!("pass  {} ({} steps)", file.display(), report.steps_run);
        return;
    }
    println!(
        "FAIL  {} at step {}: {}",
        file.display(),
        report.failed_step_index.unwrap_or_default(),
        report.message.as_deref().unwrap_or("assertion failed")
    );
}

fn write_report(dir: &Path, file: &Path, report: &HarnessReport) -> Result<()> {
    let stem = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("scenario");
    let path = report.write_to_dir(dir, stem)?;
    tracing::debug!(path = %path.display(), "report written");
    Ok(())
}
