//! Replays the bundled scenario files.

use mergerefs_harness::{
    run_loaded_scenario, run_scenario, HarnessConfig, ReportStatus, RunOutcome, Scenario,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scenario_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

fn run_file(name: &str) -> RunOutcome {
    init_tracing();
    let scenario = Scenario::from_path(&scenario_dir().join(name)).unwrap();
    run_loaded_scenario(&scenario, HarnessConfig::default()).unwrap()
}

fn assert_passes(name: &str) {
    let outcome = run_file(name);
    assert!(!outcome.is_failed(), "{name}: {:?}", outcome.report());
}

#[test]
fn attach_add_detach() {
    assert_passes("attach_add_detach.json");
}

#[test]
fn empty_collection_never_calls_anything() {
    assert_passes("empty_collection.json");
}

#[test]
fn unstable_ref_is_isolated() {
    assert_passes("unstable_isolation.json");
}

#[test]
fn add_and_remove_while_attached() {
    assert_passes("add_remove_attached.json");
}

#[test]
fn null_slot_is_a_missing_key() {
    assert_passes("null_slot.json");
}

#[test]
fn second_detach_is_a_no_op() {
    assert_passes("detach_twice.json");
}

#[test]
fn replace_node_reattaches_every_ref() {
    assert_passes("replace_node.json");
}

#[test]
fn direct_baselines() {
    assert_passes("direct_stable.json");
    assert_passes("direct_unstable.json");
    assert_passes("direct_object.json");
}

#[test]
fn every_bundled_scenario_passes() {
    init_tracing();
    let mut count = 0;
    for entry in std::fs::read_dir(scenario_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let scenario = Scenario::from_path(&path).unwrap();
        let outcome = run_loaded_scenario(&scenario, HarnessConfig::default()).unwrap();
        assert!(!outcome.is_failed(), "{}: {:?}", path.display(), outcome.report());
        count += 1;
    }
    assert!(count >= 10);
}

#[test]
fn merged_and_direct_agree_for_a_single_unstable_ref() {
    init_tracing();
    let steps = r#"[
        {"type": "render", "refs": {"u": {"spy": "u", "kind": "callback_with_cleanup", "unstable": true}}},
        {"type": "mount", "node": 2},
        {"type": "render", "refs": {"u": {"spy": "u", "kind": "callback_with_cleanup", "unstable": true}}},
        {"type": "replace_node", "node": 3},
        {"type": "unmount"},
        {"type": "assert_calls", "spy": "u", "setups": 3, "cleanups": 3}
    ]"#;

    for mode in ["merged", "direct"] {
        let input = format!(r#"{{"name": "{mode}", "mode": "{mode}", "steps": {steps}}}"#);
        let outcome = run_scenario(&input).unwrap();
        assert!(!outcome.is_failed(), "{mode}: {:?}", outcome.report());
    }
}

#[test]
fn failing_scenario_reports_the_step() {
    init_tracing();
    let outcome = run_scenario(
        r#"{
            "name": "wrong_count",
            "steps": [
                {"type": "render", "refs": {"a": {"spy": "a", "kind": "callback"}}},
                {"type": "mount", "node": 1},
                {"type": "render", "refs": {"a": {"spy": "a", "kind": "callback"}}},
                {"type": "assert_calls", "spy": "a", "setups": 2, "cleanups": 1}
            ]
        }"#,
    )
    .unwrap();

    let report = outcome.report();
    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(report.scenario.as_deref(), Some("wrong_count"));
    assert_eq!(report.failed_step_index, Some(3));
    assert_eq!(report.code.as_deref(), Some("call_count_mismatch"));
}
