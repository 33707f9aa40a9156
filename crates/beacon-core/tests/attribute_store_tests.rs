//! Integration tests for extra-property storage
//!
//! Tests cover:
//! - Register/get/set laws for arbitrary names and values
//! - Re-registration semantics
//! - Reclamation of dropped owners
//! - Concurrent access from several threads

use std::sync::Arc;
use std::thread;

use beacon_core::{AttributeStore, Instance, Value};
use proptest::prelude::*;

struct Owner;

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z0-9]{0,12}".prop_map(Value::Str),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn prop_register_then_get_returns_default(name in "[a-z_]{1,16}", default in value_strategy()) {
        let store = AttributeStore::new();
        let owner = Instance::new(Owner);
        store.register(&owner, &name, default.clone());
        prop_assert_eq!(store.get(&owner, &name), Some(default));
    }

    #[test]
    fn prop_set_wins_over_default(
        name in "[a-z_]{1,16}",
        default in value_strategy(),
        written in value_strategy(),
    ) {
        let store = AttributeStore::new();
        let owner = Instance::new(Owner);
        store.register(&owner, &name, default);
        store.set(&owner, &name, written.clone());
        prop_assert_eq!(store.get(&owner, &name), Some(written));
    }

    #[test]
    fn prop_reregister_discards_written_value(
        name in "[a-z_]{1,16}",
        first in value_strategy(),
        written in value_strategy(),
        second in value_strategy(),
    ) {
        let store = AttributeStore::new();
        let owner = Instance::new(Owner);
        store.register(&owner, &name, first);
        store.set(&owner, &name, written);
        store.register(&owner, &name, second.clone());
        prop_assert_eq!(store.get(&owner, &name), Some(second));
    }
}

#[test]
fn test_transient_instances_do_not_grow_store() {
    let store = AttributeStore::new();

    for i in 0..10_000 {
        let transient = Instance::new(Owner);
        store.register(&transient, "uid", Value::Int(i));
        store.set(&transient, "uid", Value::Int(i + 1));
    }

    // Automatic sweeps keep the table bounded by the sweep threshold
    assert!(store.len() <= 256, "store grew to {}", store.len());

    store.purge();
    assert!(store.is_empty());
}

#[test]
fn test_dropped_owner_leaves_no_trace() {
    let store = AttributeStore::new();
    let survivor = Instance::new(Owner);
    store.register(&survivor, "uid", Value::from("keep"));

    let ids: Vec<_> = (0..32)
        .map(|_| {
            let transient = Instance::new(Owner);
            store.register(&transient, "uid", Value::from("gone"));
            transient.id()
        })
        .collect();

    assert_eq!(store.purge(), ids.len());
    assert_eq!(store.len(), 1);
    for id in ids {
        assert_eq!(store.release(id), 0);
    }
    assert_eq!(store.get(&survivor, "uid"), Some(Value::from("keep")));
}

#[test]
fn test_live_owners_survive_sweeps() {
    let store = AttributeStore::new();
    let live: Vec<Instance> = (0..600).map(|_| Instance::new(Owner)).collect();
    for (i, owner) in live.iter().enumerate() {
        store.register(owner, "index", Value::Int(i as i64));
    }

    assert_eq!(store.len(), live.len());
    for (i, owner) in live.iter().enumerate() {
        assert_eq!(store.get(owner, "index"), Some(Value::Int(i as i64)));
    }
}

#[test]
fn test_concurrent_access_to_distinct_instances() {
    let store = Arc::new(AttributeStore::new());
    let owners: Vec<Instance> = (0..8).map(|_| Instance::new(Owner)).collect();

    let handles: Vec<_> = owners
        .iter()
        .cloned()
        .enumerate()
        .map(|(t, owner)| {
            let store = store.clone();
            thread::spawn(move || {
                store.register(&owner, "counter", Value::Int(0));
                for n in 1..=500 {
                    store.set(&owner, "counter", Value::Int(n));
                    assert_eq!(store.get(&owner, "counter"), Some(Value::Int(n)));
                }
                store.set(&owner, "thread", Value::Int(t as i64));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for (t, owner) in owners.iter().enumerate() {
        assert_eq!(store.get(owner, "counter"), Some(Value::Int(500)));
        assert_eq!(store.get(owner, "thread"), Some(Value::Int(t as i64)));
    }
}

#[test]
fn test_concurrent_writes_to_same_property_are_never_torn() {
    let store = Arc::new(AttributeStore::new());
    let owner = Instance::new(Owner);
    store.register(&owner, "label", Value::from("start"));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            let owner = owner.clone();
            thread::spawn(move || {
                let label = format!("writer-{}", t);
                for _ in 0..200 {
                    store.set(&owner, "label", Value::from(label.clone()));
                    let seen = store.get(&owner, "label").unwrap();
                    let text = seen.as_str().unwrap();
                    assert!(text == "start" || text.starts_with("writer-"));
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    assert!(store
        .get(&owner, "label")
        .and_then(|v| v.as_str().map(|s| s.starts_with("writer-")))
        .unwrap());
}
