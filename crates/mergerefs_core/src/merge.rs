//! Merged refs
//!
//! [`MergeRefs`] turns a keyed collection of refs into a single callback ref
//! that can be handed to an element. Every ref in the collection sees the
//! element exactly as if it had been passed on its own:
//!
//! - When the element attaches, every ref is initialized with it.
//! - When the element detaches, every ref is cleaned up.
//! - A ref added while attached is initialized; other refs see nothing.
//! - A ref removed while attached is cleaned up; other refs see nothing.
//! - A ref whose identity changes between rebuilds is cleaned up and
//!   re-initialized, without affecting its siblings.
//!
//! The merged callback is created once per [`MergeRefs`] and never replaced,
//! so the framework only calls it when the element itself changes.
//!
//! ```rust
//! use mergerefs_core::{MergeRefs, RefCallback, RefCollection, RefObject};
//!
//! let merged = MergeRefs::<u32>::new();
//! let node: RefObject<u32> = RefObject::new();
//! let focus = RefCallback::simple(|_node: Option<u32>| {});
//!
//! // Each rebuild hands the current refs over
//! let refs = RefCollection::new()
//!     .with("node", node.clone())
//!     .with("focus", focus.clone());
//! let callback = merged.merge(&refs);
//!
//! // The framework attaches the element
//! let cleanup = callback.call(Some(42));
//! assert_eq!(node.get(), Some(42));
//!
//! // ...and detaches it later
//! if let Some(cleanup) = cleanup {
//!     cleanup.run();
//! }
//! assert_eq!(node.get(), None);
//!
//! // The callback keeps its identity across rebuilds
//! assert!(merged.merge(&refs).ptr_eq(&callback));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::maybe::MaybeValue;
use crate::reconcile::{plan_reconcile, ReconcileStats, RefCollection, RefWork, StoredRefs};
use crate::sink::{Cleanup, RefCallback};

/// Attachment lifecycle of a merged ref
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachPhase {
    /// The merged callback has never received an element
    NeverAttached,
    /// An element is attached
    Attached,
    /// The last element was detached
    Detached,
}

struct MergeState<T> {
    stored: StoredRefs<T>,
    value: MaybeValue<T>,
    phase: AttachPhase,
    /// Bumped on every attach and detach
    epoch: u64,
}

type SharedMergeState<T> = Arc<Mutex<MergeState<T>>>;

fn lock<T>(state: &SharedMergeState<T>) -> MutexGuard<'_, MergeState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State behind one merged ref
///
/// Keep one instance per element call site and call [`MergeRefs::merge`] on
/// every rebuild. Refs are called with the internal lock released, so they
/// may read the instance (`phase`, `value`, `keys`, ...) while they are
/// assigned or cleaned up.
pub struct MergeRefs<T> {
    state: SharedMergeState<T>,
    callback: OnceLock<RefCallback<T>>,
}

impl<T> MergeRefs<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MergeState {
                stored: StoredRefs::default(),
                value: MaybeValue::Absent,
                phase: AttachPhase::NeverAttached,
                epoch: 0,
            })),
            callback: OnceLock::new(),
        }
    }

    /// Reconcile against `refs` and return the merged callback
    pub fn merge(&self, refs: &RefCollection<T>) -> RefCallback<T> {
        self.reconcile(refs);
        self.callback().clone()
    }

    /// Reconcile the stored refs against `refs` using the last attached value
    ///
    /// Never attaches or detaches the merged ref itself.
    pub fn reconcile(&self, refs: &RefCollection<T>) -> ReconcileStats {
        let (work, stats, value, epoch) = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            let (work, stats) = plan_reconcile(&mut state.stored, refs);
            (work, stats, state.value.as_present().cloned(), state.epoch)
        };
        run_work(&self.state, work, value.as_ref(), epoch);
        stats
    }

    /// The merged callback, created on first use
    pub fn callback(&self) -> &RefCallback<T> {
        self.callback
            .get_or_init(|| merged_callback(Arc::clone(&self.state)))
    }

    pub fn phase(&self) -> AttachPhase {
        lock(&self.state).phase
    }

    /// The attached element, if any
    pub fn value(&self) -> Option<T> {
        lock(&self.state).value.as_present().cloned()
    }

    /// Number of stored refs
    pub fn len(&self) -> usize {
        lock(&self.state).stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the stored refs, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.state).stored.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether the ref stored under `key` currently holds the element
    pub fn is_assigned(&self, key: &str) -> bool {
        lock(&self.state)
            .stored
            .get(key)
            .is_some_and(|stored| stored.is_assigned())
    }
}

impl<T> Default for MergeRefs<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Reconcile `refs` into `merged` and return its stable callback
pub fn merge_refs<T>(merged: &MergeRefs<T>, refs: &RefCollection<T>) -> RefCallback<T>
where
    T: Clone + Send + 'static,
{
    merged.merge(refs)
}

fn merged_callback<T>(state: SharedMergeState<T>) -> RefCallback<T>
where
    T: Clone + Send + 'static,
{
    RefCallback::new(move |value: Option<T>| {
        let Some(value) = value else {
            // Legacy detach signal; the cleanup path handles it.
            detach(&state);
            return None;
        };
        attach(&state, value);
        let state = Arc::clone(&state);
        Some(Cleanup::new(move || detach(&state)))
    })
}

fn attach<T>(state: &SharedMergeState<T>, value: T)
where
    T: Clone + Send + 'static,
{
    let (work, epoch) = {
        let mut guard = lock(state);
        let state = &mut *guard;
        state.value = MaybeValue::Present(value.clone());
        state.phase = AttachPhase::Attached;
        state.epoch += 1;
        tracing::debug!(refs = state.stored.len(), "merged ref attached");
        (RefWork::assign_all(&state.stored), state.epoch)
    };
    run_work(state, work, Some(&value), epoch);
}

fn detach<T>(state: &SharedMergeState<T>)
where
    T: Clone + Send + 'static,
{
    let cleanups: Vec<Cleanup> = {
        let mut guard = lock(state);
        let state = &mut *guard;
        state.value = MaybeValue::Absent;
        if state.phase == AttachPhase::Attached {
            state.phase = AttachPhase::Detached;
        }
        state.epoch += 1;
        state
            .stored
            .values_mut()
            .filter_map(|stored| stored.take_cleanup())
            .collect()
    };
    tracing::debug!(refs = cleanups.len(), "merged ref detached");
    for cleanup in cleanups {
        cleanup.run();
    }
}

/// Run sink calls outside the lock, then record the new assignments
///
/// Assignments made while an attach or detach happened in between belong to
/// a stale element and are undone instead of recorded.
fn run_work<T>(state: &SharedMergeState<T>, work: RefWork<T>, value: Option<&T>, epoch: u64)
where
    T: Clone + Send + 'static,
{
    if work.is_empty() {
        return;
    }
    let assigned = work.run(value);
    if assigned.is_empty() {
        return;
    }

    let mut guard = lock(state);
    if guard.epoch != epoch {
        drop(guard);
        assigned.discard();
        return;
    }
    let orphans = assigned.settle(&mut guard.stored);
    drop(guard);
    for cleanup in orphans {
        cleanup.run();
    }
}
