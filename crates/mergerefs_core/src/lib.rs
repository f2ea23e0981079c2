//! Merged element refs
//!
//! This crate lets several independent refs share one element while each of
//! them keeps the lifecycle it would have if it were the element's only ref:
//!
//! - **Sinks**: callback refs and object refs behind one [`RefSink`] type
//! - **Reconciliation**: keyed diffing of refs between rebuilds
//! - **Merged refs**: one stable callback that fans attach/detach out
//! - **Hooks**: call-site keyed storage so merged refs survive rebuilds
//!
//! # Example
//!
//! ```rust
//! use mergerefs_core::{MergeRefs, RefCallback, RefCollection};
//! use std::sync::{Arc, Mutex};
//!
//! let focused = Arc::new(Mutex::new(Vec::new()));
//! let focused_clone = focused.clone();
//! // Stable across rebuilds: created once and cloned into each collection
//! let auto_focus = RefCallback::simple(move |node: Option<u32>| {
//!     focused_clone.lock().unwrap().push(node);
//! });
//!
//! let merged = MergeRefs::new();
//!
//! // First rebuild, then the element attaches
//! let callback = merged.merge(&RefCollection::new().with("focus", auto_focus.clone()));
//! let detach = callback.call(Some(7));
//!
//! // Another rebuild with the same ref: nothing is called again
//! merged.merge(&RefCollection::new().with("focus", auto_focus.clone()));
//! assert_eq!(*focused.lock().unwrap(), vec![Some(7)]);
//!
//! // The element goes away
//! detach.unwrap().run();
//! assert_eq!(*focused.lock().unwrap(), vec![Some(7), None]);
//! ```

pub mod hooks;
pub mod maybe;
pub mod merge;
pub mod reconcile;
pub mod sink;
pub mod stored;

pub use hooks::{HookKey, RefHooks};
pub use maybe::MaybeValue;
pub use merge::{merge_refs, AttachPhase, MergeRefs};
pub use reconcile::{
    plan_reconcile, reconcile_refs, AssignedRefs, ReconcileStats, RefCollection, RefWork,
    StoredRefs,
};
pub use sink::{assign_to_ref, Cleanup, RefCallback, RefObject, RefSink};
pub use stored::StoredRef;
