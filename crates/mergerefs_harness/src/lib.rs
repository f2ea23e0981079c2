//! Merged ref diagnostics
//!
//! A deterministic stand-in for the framework side of element refs:
//!
//! - **Host**: [`HostElement`] mounts, re-renders and unmounts one element
//!   and drives its ref prop the way the framework does
//! - **Spies**: refs that record every attach, detach and cleanup
//! - **Scenarios**: JSON scripts of rebuilds, lifecycle steps and assertions
//! - **Runner**: replays a scenario and produces a [`HarnessReport`]
//!
//! # Example
//!
//! ```rust
//! use mergerefs_harness::run_scenario;
//!
//! let outcome = run_scenario(r#"{
//!     "name": "attach",
//!     "steps": [
//!         {"type": "render", "refs": {"a": {"spy": "a", "kind": "callback_with_cleanup"}}},
//!         {"type": "mount", "node": 1},
//!         {"type": "assert_calls", "spy": "a", "setups": 1, "cleanups": 0},
//!         {"type": "unmount"},
//!         {"type": "assert_calls", "spy": "a", "setups": 1, "cleanups": 1}
//!     ]
//! }"#).unwrap();
//!
//! assert!(!outcome.is_failed());
//! ```

pub mod assert;
pub mod host;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod spy;

pub use assert::{AssertionResult, RefSnapshot, SpySnapshot};
pub use host::{HostElement, HostError};
pub use report::{HarnessReport, ReportStatus};
pub use runner::{run_loaded_scenario, run_scenario, HarnessConfig, RunOutcome};
pub use scenario::{PhaseName, RefSpec, Scenario, ScenarioMode, ScenarioStep, SinkKind};
pub use spy::{ObjectSpy, RefCall, RefSpy};
