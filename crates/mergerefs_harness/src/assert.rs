//! Assertion helpers for scenario steps.

use crate::scenario::PhaseName;
use std::collections::BTreeMap;

/// Snapshot of observable ref state used for assertions.
#[derive(Debug, Clone, Default)]
pub struct RefSnapshot {
    pub spies: BTreeMap<String, SpySnapshot>,
    /// Lifecycle of the merged ref; `None` in direct mode
    pub phase: Option<PhaseName>,
    /// Refs held by the merged ref
    pub stored: usize,
}

/// What one spy has observed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SpySnapshot {
    Callback {
        setups: usize,
        cleanups: usize,
    },
    Object {
        current: Option<u32>,
    },
    #[default]
    Unused,
}

/// Assertion result with structured failure details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionResult {
    Passed,
    Failed { code: String, message: String },
}

impl AssertionResult {
    fn failed(code: &str, message: String) -> Self {
        AssertionResult::Failed {
            code: code.to_string(),
            message,
        }
    }
}

pub fn evaluate_assert_calls(
    spy: &str,
    setups: usize,
    cleanups: usize,
    snapshot: &RefSnapshot,
) -> AssertionResult {
    match snapshot.spies.get(spy) {
        None | Some(SpySnapshot::Unused) if setups == 0 && cleanups == 0 => {
            AssertionResult::Passed
        }
        None | Some(SpySnapshot::Unused) => AssertionResult::failed(
            "missing_spy",
            format!("{spy}: spy was never used"),
        ),
        Some(SpySnapshot::Object { .. }) => AssertionResult::failed(
            "wrong_kind",
            format!("{spy}: object refs have no call counts, use assert_current"),
        ),
        Some(SpySnapshot::Callback {
            setups: actual_setups,
            cleanups: actual_cleanups,
        }) => {
            if *actual_setups == setups && *actual_cleanups == cleanups {
                AssertionResult::Passed
            } else {
                AssertionResult::failed(
                    "call_count_mismatch",
                    format!(
                        "{spy}: expected {setups} setups/{cleanups} cleanups, got {actual_setups}/{actual_cleanups}"
                    ),
                )
            }
        }
    }
}

pub fn evaluate_assert_current(
    spy: &str,
    expected: Option<u32>,
    snapshot: &RefSnapshot,
) -> AssertionResult {
    match snapshot.spies.get(spy) {
        Some(SpySnapshot::Object { current }) if *current == expected => AssertionResult::Passed,
        Some(SpySnapshot::Object { current }) => AssertionResult::failed(
            "current_mismatch",
            format!("{spy}: expected current {expected:?}, got {current:?}"),
        ),
        Some(SpySnapshot::Callback { .. }) => AssertionResult::failed(
            "wrong_kind",
            format!("{spy}: callback refs have no current value, use assert_calls"),
        ),
        None | Some(SpySnapshot::Unused) => AssertionResult::failed(
            "missing_spy",
            format!("{spy}: spy was never used"),
        ),
    }
}

pub fn evaluate_assert_phase(expected: PhaseName, snapshot: &RefSnapshot) -> AssertionResult {
    match snapshot.phase {
        Some(phase) if phase == expected => AssertionResult::Passed,
        Some(phase) => AssertionResult::failed(
            "phase_mismatch",
            format!("expected phase {expected:?}, got {phase:?}"),
        ),
        None => AssertionResult::failed(
            "no_merged_ref",
            "phase is only tracked in merged mode".to_string(),
        ),
    }
}

pub fn evaluate_assert_stored(expected: usize, snapshot: &RefSnapshot) -> AssertionResult {
    if snapshot.stored == expected {
        AssertionResult::Passed
    } else {
        AssertionResult::failed(
            "stored_mismatch",
            format!("expected {expected} stored refs, got {}", snapshot.stored),
        )
    }
}
