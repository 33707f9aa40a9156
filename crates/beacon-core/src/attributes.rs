//! Extra-property storage
//!
//! Side table of synthetic ("extra") properties keyed by owning instance
//! identity and attribute name. Owners are held through [`WeakInstance`]
//! handles only, so the store never keeps an instance alive.
//!
//! Entries for dropped owners are unreachable through the public API (every
//! lookup goes through a live [`Instance`], and an [`InstanceId`] cannot be
//! reused while the store still holds the weak handle). They are reclaimed
//! by [`AttributeStore::purge`], which also runs automatically whenever the
//! number of tracked owners doubles past the last sweep.

use std::sync::atomic::{AtomicUsize, Ordering};

use beacon_sdk::{Instance, InstanceId, Value, WeakInstance};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHashMap;

/// Owner count below which automatic sweeping never triggers
const MIN_SWEEP_THRESHOLD: usize = 256;

#[derive(Debug, Clone)]
struct ExtraProperty {
    default: Value,
    current: Option<Value>,
}

impl ExtraProperty {
    fn new(default: Value) -> Self {
        Self {
            default,
            current: None,
        }
    }

    fn value(&self) -> &Value {
        self.current.as_ref().unwrap_or(&self.default)
    }
}

#[derive(Debug)]
struct OwnerSlot {
    owner: WeakInstance,
    properties: FxHashMap<String, ExtraProperty>,
}

impl OwnerSlot {
    fn new(owner: &Instance) -> Self {
        Self {
            owner: owner.downgrade(),
            properties: FxHashMap::default(),
        }
    }
}

/// Thread-safe store of per-instance extra properties.
///
/// Operations on different instances touch different shards and do not
/// contend; operations on the same instance are serialized by the shard
/// lock, so a read never observes a torn write.
pub struct AttributeStore {
    owners: DashMap<InstanceId, OwnerSlot>,
    next_sweep: AtomicUsize,
}

impl AttributeStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
            next_sweep: AtomicUsize::new(MIN_SWEEP_THRESHOLD),
        }
    }

    /// Register an extra property. Re-registering replaces the default and
    /// discards any value written since.
    pub fn register(&self, instance: &Instance, name: &str, default: Value) {
        self.upsert(instance, name, ExtraProperty::new(default));
    }

    /// Read an extra property: the last written value, else the registered
    /// default, else `None` if the name was never registered.
    pub fn get(&self, instance: &Instance, name: &str) -> Option<Value> {
        let slot = self.owners.get(&instance.id())?;
        slot.properties.get(name).map(|p| p.value().clone())
    }

    /// Write an extra property. An unregistered name is registered on the
    /// fly with `value` as both default and current value.
    pub fn set(&self, instance: &Instance, name: &str, value: Value) {
        if let Some(mut slot) = self.owners.get_mut(&instance.id()) {
            if let Some(property) = slot.properties.get_mut(name) {
                property.current = Some(value);
                return;
            }
        }
        self.upsert(instance, name, ExtraProperty::new(value));
    }

    /// Check if an extra property is registered
    pub fn contains(&self, instance: &Instance, name: &str) -> bool {
        self.owners
            .get(&instance.id())
            .is_some_and(|slot| slot.properties.contains_key(name))
    }

    /// Remove one extra property, returning its current value
    pub fn remove(&self, instance: &Instance, name: &str) -> Option<Value> {
        let id = instance.id();
        let removed = {
            let mut slot = self.owners.get_mut(&id)?;
            slot.properties.remove(name)
        };
        self.owners.remove_if(&id, |_, slot| slot.properties.is_empty());
        removed.map(|p| p.current.unwrap_or(p.default))
    }

    /// Names of the extra properties registered on an instance, sorted
    pub fn names(&self, instance: &Instance) -> Vec<String> {
        let mut names: Vec<String> = self
            .owners
            .get(&instance.id())
            .map(|slot| slot.properties.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Drop every extra property of an instance. Hosts that own a teardown
    /// hook can call this eagerly instead of waiting for [`purge`](Self::purge).
    ///
    /// Returns the number of properties released.
    pub fn release(&self, id: InstanceId) -> usize {
        self.owners
            .remove(&id)
            .map(|(_, slot)| slot.properties.len())
            .unwrap_or(0)
    }

    /// Reclaim the entries of every dropped owner. Returns the number of
    /// owners removed.
    pub fn purge(&self) -> usize {
        let before = self.owners.len();
        self.owners.retain(|_, slot| slot.owner.is_alive());
        let live = self.owners.len();

        self.next_sweep
            .store((live * 2).max(MIN_SWEEP_THRESHOLD), Ordering::Relaxed);

        let removed = before.saturating_sub(live);
        if removed > 0 {
            tracing::debug!(removed, live, "purged extra properties of dropped instances");
        }
        removed
    }

    /// Number of owners currently holding entries (dropped owners included
    /// until the next sweep)
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    fn upsert(&self, instance: &Instance, name: &str, property: ExtraProperty) {
        let fresh_owner = match self.owners.entry(instance.id()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().properties.insert(name.to_string(), property);
                false
            }
            Entry::Vacant(entry) => {
                let mut slot = OwnerSlot::new(instance);
                slot.properties.insert(name.to_string(), property);
                entry.insert(slot);
                true
            }
        };

        // The shard guard is released above; sweeping takes every shard lock.
        if fresh_owner && self.owners.len() >= self.next_sweep.load(Ordering::Relaxed) {
            self.purge();
        }
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::new()
    }
}
