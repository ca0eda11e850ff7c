/*!
In-memory harvest state store.
*/

use crate::state::{HarvestStateStore, StateSnapshot, StateValue};
use crate::Result;
use std::collections::btree_map::Entry;
use tracing::debug;

/// A harvest state store backed by a map and never persisted.
///
/// This type owns the namespace rules shared by every backend that keeps a
/// snapshot: setting a value creates its resource type on demand, and clearing
/// the last key of a resource type removes the resource type.
///
/// # Example
/// ```rust
/// use harvest_state::MemoryStateStore;
/// use serde_json::json;
///
/// let mut store = MemoryStateStore::new();
/// store.set("twitter_timeline", "last_id", Some(json!("1001")));
/// assert_eq!(store.get("twitter_timeline", "last_id"), Some(&json!("1001")));
///
/// store.set("twitter_timeline", "last_id", None);
/// assert!(store.snapshot().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    snapshot: StateSnapshot,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an existing snapshot
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let mut store = Self::new();
        store.replace_snapshot(snapshot);
        store
    }

    /// Look up a value without side effects
    pub fn get(&self, resource_type: &str, key: &str) -> Option<&StateValue> {
        self.snapshot.get(resource_type, key)
    }

    /// Record a value, or delete the key when `value` is `None`
    pub fn set(&mut self, resource_type: &str, key: &str, value: Option<StateValue>) {
        debug!(
            "Setting state for {} with key {} to {:?}",
            resource_type, key, value
        );

        match value {
            Some(value) => {
                self.snapshot
                    .namespaces
                    .entry(resource_type.to_string())
                    .or_default()
                    .insert(key.to_string(), value);
            }
            None => {
                if let Entry::Occupied(mut namespace) =
                    self.snapshot.namespaces.entry(resource_type.to_string())
                {
                    namespace.get_mut().remove(key);
                    if namespace.get().is_empty() {
                        namespace.remove();
                    }
                }
            }
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    /// Swap in a snapshot, dropping any empty resource types it carries
    pub fn replace_snapshot(&mut self, mut snapshot: StateSnapshot) {
        snapshot.prune_empty_namespaces();
        self.snapshot = snapshot;
    }

    /// Consume the store, returning its snapshot
    pub fn into_snapshot(self) -> StateSnapshot {
        self.snapshot
    }
}

impl HarvestStateStore for MemoryStateStore {
    fn get_state(&mut self, resource_type: &str, key: &str) -> Result<Option<StateValue>> {
        Ok(self.get(resource_type, key).cloned())
    }

    fn set_state(
        &mut self,
        resource_type: &str,
        key: &str,
        value: Option<StateValue>,
    ) -> Result<()> {
        self.set(resource_type, key, value);
        Ok(())
    }
}
