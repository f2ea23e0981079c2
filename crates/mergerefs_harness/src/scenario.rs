//! Scenario definition for merged-ref diagnostics.

use anyhow::Result;
use mergerefs_core::AttachPhase;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Sequence of rebuild, lifecycle and assertion steps
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mode: ScenarioMode,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Load a scenario from JSON text.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load a scenario from file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// How the host element receives the refs of a rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioMode {
    /// Through a merged ref
    #[default]
    Merged,
    /// The single live ref is handed to the element as is
    Direct,
}

/// Shape of a spied ref
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Callback,
    CallbackWithCleanup,
    Object,
}

/// A ref slot in a rebuild
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefSpec {
    /// Spy that records calls on this ref
    pub spy: String,
    pub kind: SinkKind,
    /// Build a new ref identity on every rebuild
    #[serde(default)]
    pub unstable: bool,
}

/// Lifecycle phase names accepted by `assert_phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    NeverAttached,
    Attached,
    Detached,
}

impl From<AttachPhase> for PhaseName {
    fn from(phase: AttachPhase) -> Self {
        match phase {
            AttachPhase::NeverAttached => PhaseName::NeverAttached,
            AttachPhase::Attached => PhaseName::Attached,
            AttachPhase::Detached => PhaseName::Detached,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Rebuild with these refs; `null` slots are empty
    Render {
        refs: BTreeMap<String, Option<RefSpec>>,
    },
    Mount {
        node: u32,
    },
    ReplaceNode {
        node: u32,
    },
    Unmount,
    /// Signal detach to the merged ref again after the host detached it
    DetachTwice,
    AssertCalls {
        spy: String,
        setups: usize,
        cleanups: usize,
    },
    AssertCurrent {
        spy: String,
        value: Option<u32>,
    },
    AssertPhase {
        phase: PhaseName,
    },
    AssertStored {
        count: usize,
    },
}

impl ScenarioStep {
    /// Name used in reports for failed assertions
    pub fn assertion_name(&self) -> Option<&'static str> {
        match self {
            ScenarioStep::AssertCalls { .. } => Some("assert_calls"),
            ScenarioStep::AssertCurrent { .. } => Some("assert_current"),
            ScenarioStep::AssertPhase { .. } => Some("assert_phase"),
            ScenarioStep::AssertStored { .. } => Some("assert_stored"),
            _ => None,
        }
    }
}
