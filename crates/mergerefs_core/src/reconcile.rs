//! Keyed ref reconciliation
//!
//! Keys play the same role as element keys in list diffing: a key whose sink
//! keeps its identity is left alone, a key whose sink changed is cleaned up
//! and re-initialized, and keys that appear or disappear are initialized or
//! cleaned up on their own. An empty slot (`None`) is the same as a missing
//! key.

use rustc_hash::FxHashMap;

use crate::maybe::MaybeValue;
use crate::sink::{assign_to_ref, Cleanup, RefSink};
use crate::stored::StoredRef;

/// Stored refs by key
pub type StoredRefs<T> = FxHashMap<String, StoredRef<T>>;

/// A keyed collection of refs to merge
///
/// Slots may be empty so callers can pass optional refs straight through.
pub struct RefCollection<T> {
    slots: FxHashMap<String, Option<RefSink<T>>>,
}

impl<T> RefCollection<T> {
    pub fn new() -> Self {
        Self {
            slots: FxHashMap::default(),
        }
    }

    /// Add a ref under `key` (builder pattern)
    pub fn with(mut self, key: impl Into<String>, sink: impl Into<RefSink<T>>) -> Self {
        self.slots.insert(key.into(), Some(sink.into()));
        self
    }

    /// Add an optional ref under `key` (builder pattern)
    pub fn with_optional(mut self, key: impl Into<String>, sink: Option<RefSink<T>>) -> Self {
        self.slots.insert(key.into(), sink);
        self
    }

    /// Set the slot for `key`, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, sink: Option<RefSink<T>>) {
        self.slots.insert(key.into(), sink);
    }

    /// The ref under `key`, if the slot exists and is filled
    pub fn get(&self, key: &str) -> Option<&RefSink<T>> {
        self.slots.get(key).and_then(Option::as_ref)
    }

    /// Keys with a filled slot, with their refs
    pub fn live(&self) -> impl Iterator<Item = (&str, &RefSink<T>)> {
        self.slots
            .iter()
            .filter_map(|(key, slot)| slot.as_ref().map(|sink| (key.as_str(), sink)))
    }

    /// Number of filled slots
    pub fn live_len(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_some()).count()
    }
}

impl<T> Default for RefCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RefCollection<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<K, T> FromIterator<(K, Option<RefSink<T>>)> for RefCollection<T>
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<RefSink<T>>)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// What a reconciliation pass did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Keys whose ref kept its identity
    pub kept: usize,
    /// Keys that were not stored before
    pub added: usize,
    /// Keys whose ref changed identity
    pub replaced: usize,
    /// Stored keys that are no longer live
    pub removed: usize,
}

impl ReconcileStats {
    /// Whether any sink was cleaned up or (re)created
    pub fn changed(&self) -> bool {
        self.added + self.replaced + self.removed > 0
    }
}

/// Sink calls owed after the stored map was updated
///
/// Planning only touches the map; the cleanups and assignments collected
/// here are run afterwards, so callers can plan under a lock and call user
/// refs without it.
pub struct RefWork<T> {
    cleanups: Vec<Cleanup>,
    assigns: Vec<(String, RefSink<T>)>,
}

impl<T> RefWork<T> {
    fn new() -> Self {
        Self {
            cleanups: Vec::new(),
            assigns: Vec::new(),
        }
    }

    /// Work that assigns every stored ref
    pub fn assign_all(stored: &StoredRefs<T>) -> Self {
        Self {
            cleanups: Vec::new(),
            assigns: stored
                .iter()
                .map(|(key, stored_ref)| (key.clone(), stored_ref.sink().clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cleanups.is_empty() && self.assigns.is_empty()
    }

    /// Run the cleanups, then assign `value` to the pending refs
    ///
    /// Without a value nothing is assigned.
    pub fn run(self, value: Option<&T>) -> AssignedRefs<T>
    where
        T: Clone + Send + 'static,
    {
        for cleanup in self.cleanups {
            cleanup.run();
        }
        let Some(value) = value else {
            return AssignedRefs {
                entries: Vec::new(),
            };
        };
        AssignedRefs {
            entries: self
                .assigns
                .into_iter()
                .map(|(key, sink)| {
                    let cleanup = assign_to_ref(&sink, value.clone());
                    (key, sink, cleanup)
                })
                .collect(),
        }
    }
}

/// Assignments made by [`RefWork::run`], waiting to be recorded
pub struct AssignedRefs<T> {
    entries: Vec<(String, RefSink<T>, Cleanup)>,
}

impl<T> AssignedRefs<T> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record each cleanup on the stored ref it belongs to
    ///
    /// Returns the cleanups whose key was removed or now holds another ref;
    /// the caller runs them.
    pub fn settle(self, stored: &mut StoredRefs<T>) -> Vec<Cleanup> {
        let mut orphans = Vec::new();
        for (key, sink, cleanup) in self.entries {
            match stored.get_mut(&key) {
                Some(stored_ref) if stored_ref.sink().same_as(&sink) => {
                    stored_ref.set_cleanup(cleanup);
                }
                _ => orphans.push(cleanup),
            }
        }
        orphans
    }

    /// Undo every assignment
    pub fn discard(self) {
        for (_, _, cleanup) in self.entries {
            cleanup.run();
        }
    }
}

/// Update `stored` to match `refs` without calling any ref
///
/// New and replaced refs are stored unassigned. The returned work holds the
/// cleanups of removed and replaced refs, followed by the assignments of new
/// and replaced ones, so each key is cleaned up before it is reinitialized.
pub fn plan_reconcile<T>(
    stored: &mut StoredRefs<T>,
    refs: &RefCollection<T>,
) -> (RefWork<T>, ReconcileStats) {
    let mut stats = ReconcileStats::default();
    let mut work = RefWork::new();

    stored.retain(|key, stored_ref| {
        if refs.get(key).is_some() {
            return true;
        }
        work.cleanups.extend(stored_ref.take_cleanup());
        stats.removed += 1;
        false
    });

    for (key, sink) in refs.live() {
        match stored.get_mut(key) {
            Some(existing) if existing.sink().same_as(sink) => {
                stats.kept += 1;
                continue;
            }
            Some(existing) => {
                work.cleanups.extend(existing.take_cleanup());
                *existing = StoredRef::unassigned(sink.clone());
                stats.replaced += 1;
            }
            None => {
                stored.insert(key.to_owned(), StoredRef::unassigned(sink.clone()));
                stats.added += 1;
            }
        }
        work.assigns.push((key.to_owned(), sink.clone()));
    }

    tracing::trace!(
        kept = stats.kept,
        added = stats.added,
        replaced = stats.replaced,
        removed = stats.removed,
        "reconciled refs"
    );

    (work, stats)
}

/// Reconcile `stored` against `refs` in place
///
/// New and replaced refs are assigned `maybe_value` when it is present and
/// left unassigned otherwise.
pub fn reconcile_refs<T>(
    stored: &mut StoredRefs<T>,
    refs: &RefCollection<T>,
    maybe_value: &MaybeValue<T>,
) -> ReconcileStats
where
    T: Clone + Send + 'static,
{
    let (work, stats) = plan_reconcile(stored, refs);
    let orphans = work.run(maybe_value.as_present()).settle(stored);
    for cleanup in orphans {
        cleanup.run();
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{RefCallback, RefObject};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn logging_ref(name: &'static str, log: &Log) -> RefSink<u32> {
        let log = log.clone();
        RefCallback::simple(move |v: Option<u32>| {
            let entry = match v {
                Some(v) => format!("{name}:{v}"),
                None => format!("{name}:null"),
            };
            log.lock().unwrap().push(entry);
        })
        .into()
    }

    fn drain(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    #[test]
    fn test_added_refs_are_initialized_with_present_value() {
        let log = Log::default();
        let mut stored = StoredRefs::default();
        let refs = RefCollection::new()
            .with("a", logging_ref("a", &log))
            .with("b", logging_ref("b", &log));

        let stats = reconcile_refs(&mut stored, &refs, &MaybeValue::Present(1));

        assert_eq!(stats.added, 2);
        let mut calls = drain(&log);
        calls.sort();
        assert_eq!(calls, vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_absent_value_creates_unassigned_records() {
        let log = Log::default();
        let mut stored = StoredRefs::default();
        let refs = RefCollection::new().with("a", logging_ref("a", &log));

        reconcile_refs(&mut stored, &refs, &MaybeValue::Absent);

        assert_eq!(stored.len(), 1);
        assert!(!stored["a"].is_assigned());
        assert!(drain(&log).is_empty());
    }

    #[test]
    fn test_stable_ref_is_untouched() {
        let log = Log::default();
        let a = logging_ref("a", &log);
        let mut stored = StoredRefs::default();
        let refs = RefCollection::new().with("a", a.clone());

        reconcile_refs(&mut stored, &refs, &MaybeValue::Present(1));
        drain(&log);

        let stats = reconcile_refs(&mut stored, &refs.clone(), &MaybeValue::Present(1));
        assert_eq!(stats.kept, 1);
        assert!(!stats.changed());
        assert!(drain(&log).is_empty());
    }

    #[test]
    fn test_replaced_ref_cleans_up_before_reinit() {
        let log = Log::default();
        let mut stored = StoredRefs::default();

        let first = RefCollection::new().with("a", logging_ref("old", &log));
        reconcile_refs(&mut stored, &first, &MaybeValue::Present(2));
        drain(&log);

        let second = RefCollection::new().with("a", logging_ref("new", &log));
        let stats = reconcile_refs(&mut stored, &second, &MaybeValue::Present(2));

        assert_eq!(stats.replaced, 1);
        assert_eq!(drain(&log), vec!["old:null", "new:2"]);
    }

    #[test]
    fn test_replaced_ref_without_value_is_only_cleaned() {
        let log = Log::default();
        let mut stored = StoredRefs::default();

        let first = RefCollection::new().with("a", logging_ref("old", &log));
        reconcile_refs(&mut stored, &first, &MaybeValue::Absent);

        let second = RefCollection::new().with("a", logging_ref("new", &log));
        reconcile_refs(&mut stored, &second, &MaybeValue::Absent);

        // Old ref was never assigned, so there is nothing to clean up
        assert!(drain(&log).is_empty());
        assert!(!stored["a"].is_assigned());
    }

    #[test]
    fn test_empty_slot_is_same_as_missing_key() {
        let log = Log::default();
        let a = logging_ref("a", &log);
        let b = logging_ref("b", &log);

        for removal in [
            RefCollection::new().with("a", a.clone()),
            RefCollection::new()
                .with("a", a.clone())
                .with_optional("b", None),
        ] {
            let mut stored = StoredRefs::default();
            let both = RefCollection::new().with("a", a.clone()).with("b", b.clone());
            reconcile_refs(&mut stored, &both, &MaybeValue::Present(3));
            drain(&log);

            let stats = reconcile_refs(&mut stored, &removal, &MaybeValue::Present(3));
            assert_eq!(stats.removed, 1);
            assert_eq!(stats.kept, 1);
            assert_eq!(drain(&log), vec!["b:null"]);
            assert!(!stored.contains_key("b"));
        }
    }

    #[test]
    fn test_zero_live_keys_empties_store() {
        let obj: RefObject<u32> = RefObject::new();
        let mut stored = StoredRefs::default();
        let refs = RefCollection::new().with("obj", obj.clone());
        reconcile_refs(&mut stored, &refs, &MaybeValue::Present(9));
        assert_eq!(obj.get(), Some(9));

        let empty: RefCollection<u32> = [("obj", None)].into_iter().collect();
        let stats = reconcile_refs(&mut stored, &empty, &MaybeValue::Present(9));

        assert_eq!(stats.removed, 1);
        assert!(stored.is_empty());
        assert_eq!(obj.get(), None);
    }

    #[test]
    fn test_plan_defers_every_call() {
        let log = Log::default();
        let mut stored = StoredRefs::default();
        let first = RefCollection::new()
            .with("kept", logging_ref("kept", &log))
            .with("swap", logging_ref("old", &log))
            .with("gone", logging_ref("gone", &log));
        reconcile_refs(&mut stored, &first, &MaybeValue::Present(5));
        drain(&log);

        let second = RefCollection::new()
            .with("kept", first.get("kept").unwrap().clone())
            .with("swap", logging_ref("new", &log))
            .with("added", logging_ref("added", &log));
        let (work, stats) = plan_reconcile(&mut stored, &second);

        assert_eq!(
            stats,
            ReconcileStats {
                kept: 1,
                added: 1,
                replaced: 1,
                removed: 1,
            }
        );
        assert!(drain(&log).is_empty());
        assert!(!stored["swap"].is_assigned());
        assert!(stored["kept"].is_assigned());

        let orphans = work.run(Some(&5)).settle(&mut stored);
        assert!(orphans.is_empty());
        let calls = drain(&log);
        assert_eq!(calls.len(), 4);
        // Cleanups of removed and replaced refs come before any assignment
        assert!(calls[..2].contains(&"old:null".to_string()));
        assert!(calls[..2].contains(&"gone:null".to_string()));
        assert!(calls[2..].contains(&"new:5".to_string()));
        assert!(calls[2..].contains(&"added:5".to_string()));
        assert!(stored.values().all(|stored_ref| stored_ref.is_assigned()));
    }

    #[test]
    fn test_settle_returns_cleanups_of_replaced_keys() {
        let obj: RefObject<u32> = RefObject::new();
        let mut stored = StoredRefs::default();
        let refs = RefCollection::new().with("obj", obj.clone());
        let (work, _) = plan_reconcile(&mut stored, &refs);
        let assigned = work.run(Some(&8));
        assert_eq!(obj.get(), Some(8));

        // The key moved on to another ref before the assignment was recorded
        let other = RefCollection::new().with("obj", RefObject::new());
        let (_, _) = plan_reconcile(&mut stored, &other);

        let orphans = assigned.settle(&mut stored);
        assert_eq!(orphans.len(), 1);
        for cleanup in orphans {
            cleanup.run();
        }
        assert_eq!(obj.get(), None);
        assert!(!stored["obj"].is_assigned());
    }

    #[test]
    fn test_live_len_ignores_empty_slots() {
        let refs: RefCollection<u32> = RefCollection::new()
            .with("a", RefObject::new())
            .with_optional("b", None);
        assert_eq!(refs.live_len(), 1);
        assert!(refs.get("b").is_none());
        assert_eq!(refs.live().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a"]);
    }
}
