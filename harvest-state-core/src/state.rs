/*!
Harvest state model and the store abstraction.

A harvest state store keeps track of how far harvesting has progressed for
different kinds of resources, for example the last tweet fetched from a user
timeline. State is partitioned by resource type: each resource type owns a flat
mapping from key to an arbitrary JSON value, and resource types never see each
other's keys.
*/

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single stored state value.
///
/// Any JSON value is accepted, including `null`. Absence is expressed with
/// `Option::None` at the API, never with a reserved value.
pub type StateValue = serde_json::Value;

/// Key/value entries recorded for one resource type.
pub type Namespace = BTreeMap<String, StateValue>;

/// Complete image of every resource type and its entries.
///
/// Serializes as a JSON object of objects:
///
/// ```json
/// {"twitter_timeline": {"last_id": "1001"}}
/// ```
///
/// Resource types are only ever present while they hold at least one key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct StateSnapshot {
    pub(crate) namespaces: BTreeMap<String, Namespace>,
}

impl StateSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a single value
    pub fn get(&self, resource_type: &str, key: &str) -> Option<&StateValue> {
        self.namespaces.get(resource_type)?.get(key)
    }

    /// Entries recorded for a resource type, if any
    pub fn namespace(&self, resource_type: &str) -> Option<&Namespace> {
        self.namespaces.get(resource_type)
    }

    /// True if the resource type has at least one recorded key
    pub fn contains_namespace(&self, resource_type: &str) -> bool {
        self.namespaces.contains_key(resource_type)
    }

    /// Resource types with recorded state, in sorted order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Every `(resource_type, key, value)` triple, sorted by resource type then key
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &StateValue)> {
        self.namespaces.iter().flat_map(|(resource_type, entries)| {
            entries
                .iter()
                .map(move |(key, value)| (resource_type.as_str(), key.as_str(), value))
        })
    }

    /// Total number of recorded keys across all resource types
    pub fn len(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Drop resource types that hold no keys, e.g. from a hand-edited file
    pub(crate) fn prune_empty_namespaces(&mut self) {
        self.namespaces.retain(|_, entries| !entries.is_empty());
    }
}

/// Storage abstraction for harvest state.
///
/// Harvesters hold one store and call [`get_state`](Self::get_state) before
/// resuming work and [`set_state`](Self::set_state) after making progress.
/// Implementations differ only in persistence and freshness guarantees.
pub trait HarvestStateStore {
    /// Retrieve a state value
    ///
    /// # Arguments
    /// * `resource_type` - Namespace of the resource that stored the state
    /// * `key` - Key of the state being retrieved
    ///
    /// # Returns
    /// The stored value, or `None` if nothing is recorded
    fn get_state(&mut self, resource_type: &str, key: &str) -> Result<Option<StateValue>>;

    /// Record or clear a state value
    ///
    /// Passing `None` deletes the key. A resource type whose last key is
    /// deleted disappears entirely.
    ///
    /// # Arguments
    /// * `resource_type` - Namespace of the resource storing the state
    /// * `key` - Key of the state being stored
    /// * `value` - New value, or `None` to delete an existing value
    fn set_state(
        &mut self,
        resource_type: &str,
        key: &str,
        value: Option<StateValue>,
    ) -> Result<()>;

    /// Delete a state value. Clearing an absent key is a no-op.
    fn clear_state(&mut self, resource_type: &str, key: &str) -> Result<()> {
        self.set_state(resource_type, key, None)
    }
}

impl<T: HarvestStateStore + ?Sized> HarvestStateStore for Box<T> {
    fn get_state(&mut self, resource_type: &str, key: &str) -> Result<Option<StateValue>> {
        (**self).get_state(resource_type, key)
    }

    fn set_state(
        &mut self,
        resource_type: &str,
        key: &str,
        value: Option<StateValue>,
    ) -> Result<()> {
        (**self).set_state(resource_type, key, value)
    }
}

impl<T: HarvestStateStore + ?Sized> HarvestStateStore for &mut T {
    fn get_state(&mut self, resource_type: &str, key: &str) -> Result<Option<StateValue>> {
        (**self).get_state(resource_type, key)
    }

    fn set_state(
        &mut self,
        resource_type: &str,
        key: &str,
        value: Option<StateValue>,
    ) -> Result<()> {
        (**self).set_state(resource_type, key, value)
    }
}
