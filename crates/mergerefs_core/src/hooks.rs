//! Keyed merged-ref hooks
//!
//! Components that are rebuilt every frame cannot hold a [`MergeRefs`] in a
//! local variable: the merged callback would get a new identity on every
//! rebuild and the element would re-attach each time. [`RefHooks`] keeps one
//! [`MergeRefs`] per call-site key so the callback survives rebuilds.
//!
//! ```rust
//! use mergerefs_core::{RefCollection, RefHooks, RefObject};
//!
//! let hooks = RefHooks::new();
//! let node: RefObject<u64> = RefObject::new();
//! let refs = RefCollection::new().with("node", node.clone());
//!
//! let first = hooks.use_merge_refs_keyed("search_input", &refs);
//! let again = hooks.use_merge_refs_keyed("search_input", &refs);
//! assert!(first.ptr_eq(&again));
//! ```

use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::merge::MergeRefs;
use crate::reconcile::RefCollection;
use crate::sink::RefCallback;

/// Key for one merged-ref call site
///
/// The value type is part of the key, so the same string used for two
/// element types yields two independent call sites.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HookKey {
    key: String,
    type_id: TypeId,
}

impl HookKey {
    pub fn new<T: 'static>(key: &str) -> Self {
        Self {
            key: key.to_string(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Keyed storage of merged refs that persists across rebuilds
#[derive(Default)]
pub struct RefHooks {
    slots: Mutex<FxHashMap<HookKey, Arc<dyn Any + Send + Sync>>>,
}

impl RefHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, FxHashMap<HookKey, Arc<dyn Any + Send + Sync>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get or create the merged ref for `key`
    pub fn merge_refs_for<T>(&self, key: &str) -> Arc<MergeRefs<T>>
    where
        T: Clone + Send + 'static,
    {
        let hook_key = HookKey::new::<T>(key);
        let mut slots = self.slots();

        if let Some(existing) = slots.get(&hook_key) {
            if let Ok(merged) = Arc::clone(existing).downcast::<MergeRefs<T>>() {
                return merged;
            }
        }

        tracing::trace!(key, "creating merged ref hook");
        let merged = Arc::new(MergeRefs::<T>::new());
        slots.insert(hook_key, merged.clone());
        merged
    }

    /// Reconcile `refs` for the call site `key` and return its stable callback
    pub fn use_merge_refs_keyed<T>(&self, key: &str, refs: &RefCollection<T>) -> RefCallback<T>
    where
        T: Clone + Send + 'static,
    {
        // Release the map lock before user refs run during reconciliation
        let merged = self.merge_refs_for::<T>(key);
        merged.merge(refs)
    }

    /// Forget the call site `key` for element type `T`
    ///
    /// Returns whether a call site was stored. The next use of the key starts
    /// from scratch with a new callback identity.
    pub fn release<T: 'static>(&self, key: &str) -> bool {
        self.slots().remove(&HookKey::new::<T>(key)).is_some()
    }

    pub fn contains<T: 'static>(&self, key: &str) -> bool {
        self.slots().contains_key(&HookKey::new::<T>(key))
    }

    /// Number of stored call sites
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::AttachPhase;
    use crate::sink::RefObject;

    #[test]
    fn test_same_key_returns_same_callback() {
        let hooks = RefHooks::new();
        let refs: RefCollection<u32> = RefCollection::new();

        let a = hooks.use_merge_refs_keyed("a", &refs);
        let a_again = hooks.use_merge_refs_keyed("a", &refs);
        let b = hooks.use_merge_refs_keyed("b", &refs);

        assert!(a.ptr_eq(&a_again));
        assert!(!a.ptr_eq(&b));
        assert_eq!(hooks.len(), 2);
    }

    #[test]
    fn test_key_is_scoped_by_type() {
        let hooks = RefHooks::new();
        hooks.use_merge_refs_keyed::<u32>("shared", &RefCollection::new());
        hooks.use_merge_refs_keyed::<String>("shared", &RefCollection::new());

        assert_eq!(hooks.len(), 2);
        assert!(hooks.contains::<u32>("shared"));
        assert!(hooks.contains::<String>("shared"));
    }

    #[test]
    fn test_keys_compare_by_full_name() {
        let key = HookKey::new::<u32>("search_input");
        assert_eq!(key, HookKey::new::<u32>("search_input"));
        assert_ne!(key, HookKey::new::<u32>("search_input_2"));
        assert_ne!(key, HookKey::new::<u64>("search_input"));
        assert_eq!(key.key(), "search_input");

        let hooks = RefHooks::new();
        let keys: Vec<String> = (0..256).map(|i| format!("row_{i}")).collect();
        let callbacks: Vec<_> = keys
            .iter()
            .map(|key| hooks.use_merge_refs_keyed::<u32>(key, &RefCollection::new()))
            .collect();

        assert_eq!(hooks.len(), keys.len());
        for (i, callback) in callbacks.iter().enumerate() {
            assert!(callbacks[i + 1..].iter().all(|other| !other.ptr_eq(callback)));
        }
    }

    #[test]
    fn test_release_starts_fresh() {
        let hooks = RefHooks::new();
        let obj: RefObject<u32> = RefObject::new();
        let refs = RefCollection::new().with("obj", obj.clone());

        let first = hooks.use_merge_refs_keyed("input", &refs);
        let _cleanup = first.call(Some(1));
        assert_eq!(obj.get(), Some(1));

        assert!(hooks.release::<u32>("input"));
        assert!(!hooks.release::<u32>("input"));

        let second = hooks.use_merge_refs_keyed("input", &refs);
        assert!(!first.ptr_eq(&second));
        assert_eq!(hooks.merge_refs_for::<u32>("input").phase(), AttachPhase::NeverAttached);
    }
}
