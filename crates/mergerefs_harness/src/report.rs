//! Report output model for scenario runs.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Report status for a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Passed,
    Failed,
}

/// Machine-readable result of a scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessReport {
    pub scenario: Option<String>,
    pub status: ReportStatus,
    pub failed_step_index: Option<usize>,
    pub assertion: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub steps_run: usize,
}

impl HarnessReport {
    pub fn passed(scenario: Option<String>, steps_run: usize) -> Self {
        Self {
            scenario,
            status: ReportStatus::Passed,
            failed_step_index: None,
            assertion: None,
            code: None,
            message: None,
            steps_run,
        }
    }

    pub fn failed(
        scenario: Option<String>,
        assertion: &str,
        failed_step_index: usize,
        code: String,
        message: String,
    ) -> Self {
        Self {
            scenario,
            status: ReportStatus::Failed,
            failed_step_index: Some(failed_step_index),
            assertion: Some(assertion.to_string()),
            code: Some(code),
            message: Some(message),
            steps_run: failed_step_index + 1,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == ReportStatus::Passed
    }

    /// Write the report to `<dir>/<stem>.json`, creating `dir` as needed
    ///
    /// `stem` must be a plain file name so reports cannot escape `dir`.
    pub fn write_to_dir(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        let mut components = Path::new(stem).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            bail!("report name '{stem}' must be a plain file name");
        }

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(format!("{stem}.json"));
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_to_writer(&mut file)?;
        Ok(path)
    }

    pub fn write_to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)?;
        writer.write_all(payload.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_report_json() {
        let report = HarnessReport::failed(
            Some("add_ref".to_string()),
            "assert_calls",
            3,
            "call_count_mismatch".to_string(),
            "c: expected 1 setups/0 cleanups, got 0/0".to_string(),
        );

        let mut out = Vec::new();
        report.write_to_writer(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["status"], "failed");
        assert_eq!(value["failed_step_index"], 3);
        assert_eq!(value["steps_run"], 4);
        assert_eq!(value["assertion"], "assert_calls");
    }

    #[test]
    fn test_write_to_dir() {
        let dir = std::env::temp_dir().join(format!("mergerefs-report-{}", std::process::id()));
        let report = HarnessReport::passed(Some("ok".to_string()), 2);

        let path = report.write_to_dir(&dir.join("nested"), "ok").unwrap();
        assert_eq!(path, dir.join("nested").join("ok.json"));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "passed");
        assert_eq!(value["steps_run"], 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_to_dir_rejects_escaping_names() {
        let dir = std::env::temp_dir();
        let report = HarnessReport::passed(None, 0);
        for stem in ["../escape", "a/b", "", ".", "/abs"] {
            assert!(report.write_to_dir(&dir, stem).is_err(), "{stem:?}");
        }
    }
}
