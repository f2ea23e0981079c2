//! mergerefs.toml handling

use anyhow::{Context, Result};
use mergerefs_harness::HarnessConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "mergerefs.toml";

/// Top-level configuration (mergerefs.toml)
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MergeRefsConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Scenario run configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct RunConfig {
    /// Directory for JSON reports; no reports are written when unset
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
    /// Stop at the first failed assertion and the first failing file
    #[serde(default = "default_true")]
    pub fail_fast: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_steps() -> usize {
    HarnessConfig::default().max_steps
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            report_dir: None,
            fail_fast: true,
            max_steps: default_max_steps(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct LogConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl MergeRefsConfig {
    /// Load configuration from a file or a directory holding mergerefs.toml
    pub fn load_from_dir(path: &Path) -> Result<Self> {
        let config_path = if path.is_file() {
            path.to_path_buf()
        } else {
            path.join(CONFIG_FILE)
        };

        if !config_path.exists() {
            anyhow::bail!(
                "No {CONFIG_FILE} found in {}. Run `mergerefs init` to create one.",
                path.display()
            );
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Load an explicit config, or mergerefs.toml in the working directory
    /// when present, or the defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_dir(path),
            None if Path::new(CONFIG_FILE).is_file() => Self::load_from_dir(Path::new(".")),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            fail_fast: self.run.fail_fast,
            max_steps: self.run.max_steps,
        }
    }
}
