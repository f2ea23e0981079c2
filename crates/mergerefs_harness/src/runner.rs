//! Scenario runner that replays ref lifecycles against a simulated host.

use crate::assert::{
    evaluate_assert_calls, evaluate_assert_current, evaluate_assert_phase,
    evaluate_assert_stored, AssertionResult, RefSnapshot, SpySnapshot,
};
use crate::host::HostElement;
use crate::report::HarnessReport;
use crate::scenario::{PhaseName, RefSpec, Scenario, ScenarioMode, ScenarioStep, SinkKind};
use crate::spy::{ObjectSpy, RefSpy};
use anyhow::{bail, Context, Result};
use mergerefs_core::{MergeRefs, RefCollection, RefSink};
use std::collections::BTreeMap;

/// Runner configuration.
#[derive(Debug, Clone, Copy)]
pub struct HarnessConfig {
    /// Stop at the first failed assertion
    pub fail_fast: bool,
    /// Reject scenarios with more steps than this
    pub max_steps: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fail_fast: true,
            max_steps: 10_000,
        }
    }
}

/// Final outcome of a scenario run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Passed { report: HarnessReport },
    Failed { report: HarnessReport },
}

impl RunOutcome {
    pub fn report(&self) -> &HarnessReport {
        match self {
            RunOutcome::Passed { report } => report,
            RunOutcome::Failed { report } => report,
        }
    }

    pub fn into_report(self) -> HarnessReport {
        match self {
            RunOutcome::Passed { report } => report,
            RunOutcome::Failed { report } => report,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

/// Execute scenario JSON with the default configuration.
pub fn run_scenario(input: &str) -> Result<RunOutcome> {
    let scenario = Scenario::from_json(input)?;
    run_loaded_scenario(&scenario, HarnessConfig::default())
}

/// Execute a pre-loaded scenario.
///
/// Host contract violations (mounting twice, unmounting an unmounted
/// element) and malformed steps are errors; failed assertions are reported
/// through the outcome.
pub fn run_loaded_scenario(scenario: &Scenario, config: HarnessConfig) -> Result<RunOutcome> {
    if scenario.steps.len() > config.max_steps {
        bail!(
            "scenario has {} steps, more than the configured maximum of {}",
            scenario.steps.len(),
            config.max_steps
        );
    }

    let mut rig = RefRig::new(scenario.mode);
    let mut first_failure: Option<HarnessReport> = None;

    for (step_index, step) in scenario.steps.iter().enumerate() {
        let result = rig
            .apply(step)
            .with_context(|| format!("step {step_index} failed"))?;

        let AssertionResult::Failed { code, message } = result else {
            continue;
        };
        let assertion = step.assertion_name().unwrap_or("step");
        tracing::debug!(step_index, assertion, %code, "assertion failed");

        if first_failure.is_none() {
            first_failure = Some(HarnessReport::failed(
                scenario.name.clone(),
                assertion,
                step_index,
                code,
                message,
            ));
        }
        if config.fail_fast {
            break;
        }
    }

    match first_failure {
        Some(mut report) => {
            if !config.fail_fast {
                report.steps_run = scenario.steps.len();
            }
            Ok(RunOutcome::Failed { report })
        }
        None => Ok(RunOutcome::Passed {
            report: HarnessReport::passed(scenario.name.clone(), scenario.steps.len()),
        }),
    }
}

/// The element, its refs and the spies observing them
struct RefRig {
    mode: ScenarioMode,
    merged: MergeRefs<u32>,
    host: HostElement<u32>,
    /// Ref prop handed to the host on the next commit
    prop: Option<RefSink<u32>>,
    callback_spies: BTreeMap<String, RefSpy<u32>>,
    object_spies: BTreeMap<String, ObjectSpy<u32>>,
    /// Stable refs, built once per spy and kind
    stable: BTreeMap<(String, SinkKind), RefSink<u32>>,
}

impl RefRig {
    fn new(mode: ScenarioMode) -> Self {
        let merged = MergeRefs::new();
        let prop = match mode {
            ScenarioMode::Merged => Some(RefSink::from(merged.callback().clone())),
            ScenarioMode::Direct => None,
        };
        Self {
            mode,
            merged,
            host: HostElement::new(),
            prop,
            callback_spies: BTreeMap::new(),
            object_spies: BTreeMap::new(),
            stable: BTreeMap::new(),
        }
    }

    fn apply(&mut self, step: &ScenarioStep) -> Result<AssertionResult> {
        match step {
            ScenarioStep::Render { refs } => {
                self.render(refs)?;
            }
            ScenarioStep::Mount { node } => {
                self.host.mount(*node, self.prop.clone())?;
            }
            ScenarioStep::ReplaceNode { node } => {
                self.host.replace_node(*node)?;
            }
            ScenarioStep::Unmount => {
                self.host.unmount()?;
            }
            ScenarioStep::DetachTwice => {
                if self.mode != ScenarioMode::Merged {
                    bail!("detach_twice needs a merged ref");
                }
                if self.merged.callback().call(None).is_some() {
                    bail!("detaching the merged ref returned a cleanup");
                }
            }
            ScenarioStep::AssertCalls {
                spy,
                setups,
                cleanups,
            } => return Ok(evaluate_assert_calls(spy, *setups, *cleanups, &self.snapshot())),
            ScenarioStep::AssertCurrent { spy, value } => {
                return Ok(evaluate_assert_current(spy, *value, &self.snapshot()))
            }
            ScenarioStep::AssertPhase { phase } => {
                return Ok(evaluate_assert_phase(*phase, &self.snapshot()))
            }
            ScenarioStep::AssertStored { count } => {
                return Ok(evaluate_assert_stored(*count, &self.snapshot()))
            }
        }
        Ok(AssertionResult::Passed)
    }

    fn render(&mut self, refs: &BTreeMap<String, Option<RefSpec>>) -> Result<()> {
        let mut collection = RefCollection::new();
        for (key, spec) in refs {
            let sink = match spec {
                Some(spec) => Some(self.sink_for(spec)?),
                None => None,
            };
            collection.insert(key.as_str(), sink);
        }

        self.prop = match self.mode {
            ScenarioMode::Merged => Some(RefSink::from(self.merged.merge(&collection))),
            ScenarioMode::Direct => {
                if collection.live_len() > 1 {
                    bail!(
                        "direct mode takes at most one ref, got {}",
                        collection.live_len()
                    );
                }
                collection.live().next().map(|(_, sink)| sink.clone())
            }
        };
        self.host.render(self.prop.clone());
        Ok(())
    }

    fn sink_for(&mut self, spec: &RefSpec) -> Result<RefSink<u32>> {
        let name = spec.spy.as_str();
        match spec.kind {
            SinkKind::Object => {
                if self.callback_spies.contains_key(name) {
                    bail!("spy '{name}' is already used for callback refs");
                }
                let spy = self
                    .object_spies
                    .entry(name.to_string())
                    .or_insert_with(|| ObjectSpy::new(name));
                if spec.unstable {
                    return Ok(RefSink::from(spy.renew().clone()));
                }
                Ok(RefSink::from(spy.object().clone()))
            }
            SinkKind::Callback | SinkKind::CallbackWithCleanup => {
                if self.object_spies.contains_key(name) {
                    bail!("spy '{name}' is already used for object refs");
                }
                let spy: &RefSpy<u32> = self
                    .callback_spies
                    .entry(name.to_string())
                    .or_insert_with(|| RefSpy::new(name));
                let build = |spy: &RefSpy<u32>| match spec.kind {
                    SinkKind::CallbackWithCleanup => RefSink::from(spy.callback_with_cleanup()),
                    _ => RefSink::from(spy.callback()),
                };
                if spec.unstable {
                    return Ok(build(spy));
                }
                let sink = self
                    .stable
                    .entry((name.to_string(), spec.kind))
                    .or_insert_with(|| build(spy));
                Ok(sink.clone())
            }
        }
    }

    fn snapshot(&self) -> RefSnapshot {
        let mut spies = BTreeMap::new();
        for (name, spy) in &self.callback_spies {
            spies.insert(
                name.clone(),
                SpySnapshot::Callback {
                    setups: spy.setups(),
                    cleanups: spy.cleanups(),
                },
            );
        }
        for (name, spy) in &self.object_spies {
            spies.insert(
                name.clone(),
                SpySnapshot::Object {
                    current: spy.current(),
                },
            );
        }

        let (phase, stored) = match self.mode {
            ScenarioMode::Merged => (
                Some(PhaseName::from(self.merged.phase())),
                self.merged.len(),
            ),
            ScenarioMode::Direct => (None, usize::from(self.prop.is_some())),
        };
        RefSnapshot {
            spies,
            phase,
            stored,
        }
    }
}
