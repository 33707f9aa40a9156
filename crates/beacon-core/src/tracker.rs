//! Tracking coordinator
//!
//! The single extension point of the engine. An [`EventTracker`] is asked,
//! once per completed eligible call, whether the call should fire an event;
//! a non-empty identifier means yes. The [`TrackingCoordinator`] isolates
//! tracker failures: a panicking tracker is logged and counted, and the
//! tracked call's result is never affected.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use beacon_sdk::Instance;
use serde::Serialize;

use crate::config::ConfigurationRegistry;
use crate::invocation::{ArgumentList, InvocationRecord};
use crate::resolver::NameResolver;

/// Decides whether (and as what) a completed call is reported.
///
/// Implementations may inspect the arguments and read instance attributes
/// through the resolver. Returning `None` (or an empty string) means no
/// event fires. The engine does not deduplicate retried calls.
pub trait EventTracker: Send + Sync {
    /// Produce a tracking identifier for a call, if any
    fn tracking_method(
        &self,
        method: &str,
        instance: &Instance,
        arguments: &ArgumentList,
        resolver: &NameResolver<'_>,
    ) -> Option<String>;
}

/// Adapter turning a closure into an [`EventTracker`]
pub struct FnTracker<F>(F);

/// Build a tracker from a closure
pub fn tracker_fn<F>(f: F) -> FnTracker<F>
where
    F: Fn(&str, &Instance, &ArgumentList, &NameResolver<'_>) -> Option<String> + Send + Sync,
{
    FnTracker(f)
}

impl<F> EventTracker for FnTracker<F>
where
    F: Fn(&str, &Instance, &ArgumentList, &NameResolver<'_>) -> Option<String> + Send + Sync,
{
    fn tracking_method(
        &self,
        method: &str,
        instance: &Instance,
        arguments: &ArgumentList,
        resolver: &NameResolver<'_>,
    ) -> Option<String> {
        (self.0)(method, instance, arguments, resolver)
    }
}

/// Reports the event identifier configured on the matching rule, or
/// `Class.method` when the rule names none.
pub struct RuleTracker {
    config: Arc<ConfigurationRegistry>,
}

impl RuleTracker {
    /// Create a tracker over a configuration registry
    pub fn new(config: Arc<ConfigurationRegistry>) -> Self {
        Self { config }
    }
}

impl EventTracker for RuleTracker {
    fn tracking_method(
        &self,
        method: &str,
        instance: &Instance,
        _arguments: &ArgumentList,
        resolver: &NameResolver<'_>,
    ) -> Option<String> {
        let class = resolver.class_name(instance);
        let rule = self.config.rule_for(&class, method)?;
        if !rule.enabled {
            return None;
        }
        Some(rule.event.unwrap_or_else(|| format!("{}.{}", class, method)))
    }
}

/// A fired tracking event, handed to the host for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingEvent {
    /// Identifier produced by the tracker
    pub identifier: String,
    /// Class name of the target
    pub class: String,
    /// Operation name
    pub method: String,
    /// Arguments of the call
    pub arguments: ArgumentList,
}

/// Consults the installed tracker and isolates its failures
pub struct TrackingCoordinator {
    tracker: Arc<dyn EventTracker>,
    failures: AtomicU64,
}

impl TrackingCoordinator {
    /// Wrap a tracker
    pub fn new(tracker: impl EventTracker + 'static) -> Self {
        Self::from_arc(Arc::new(tracker))
    }

    /// Wrap a shared tracker
    pub fn from_arc(tracker: Arc<dyn EventTracker>) -> Self {
        Self {
            tracker,
            failures: AtomicU64::new(0),
        }
    }

    /// Ask the tracker about a completed call
    pub fn consult(&self, record: &InvocationRecord, resolver: &NameResolver<'_>) -> Option<TrackingEvent> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.tracker
                .tracking_method(record.method(), record.target(), record.arguments(), resolver)
        }));

        match outcome {
            Ok(Some(identifier)) if !identifier.is_empty() => {
                tracing::debug!(
                    class = %record.class(),
                    method = %record.method(),
                    identifier = %identifier,
                    "tracking event fired"
                );
                Some(TrackingEvent {
                    identifier,
                    class: record.class().to_string(),
                    method: record.method().to_string(),
                    arguments: record.arguments().clone(),
                })
            }
            Ok(_) => None,
            Err(payload) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    class = %record.class(),
                    method = %record.method(),
                    "tracker panicked: {}",
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }

    /// Number of tracker invocations that panicked
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeStore;
    use crate::class::ClassRegistry;
    use crate::config::TrackingRule;
    use beacon_sdk::Value;

    struct Cart;

    fn record(method: &str) -> InvocationRecord {
        InvocationRecord::new(
            Instance::new(Cart),
            "Cart",
            method,
            ArgumentList::capture(("item-1", "item-2")),
        )
    }

    #[test]
    fn test_identifier_fires_event() {
        let classes = ClassRegistry::new();
        let attrs = AttributeStore::new();
        let resolver = NameResolver::new(&classes, &attrs);
        let coordinator = TrackingCoordinator::new(tracker_fn(|method, _, args, _| {
            Some(format!("{}:{}", method, args.len()))
        }));

        let event = coordinator.consult(&record("checkout"), &resolver).unwrap();
        assert_eq!(event.identifier, "checkout:2");
        assert_eq!(event.class, "Cart");
        assert_eq!(event.arguments[1], Value::from("item-2"));
    }

    #[test]
    fn test_none_and_empty_do_not_fire() {
        let classes = ClassRegistry::new();
        let attrs = AttributeStore::new();
        let resolver = NameResolver::new(&classes, &attrs);

        let silent = TrackingCoordinator::new(tracker_fn(|_, _, _, _| None));
        assert!(silent.consult(&record("a"), &resolver).is_none());

        let empty = TrackingCoordinator::new(tracker_fn(|_, _, _, _| Some(String::new())));
        assert!(empty.consult(&record("a"), &resolver).is_none());
        assert_eq!(empty.failures(), 0);
    }

    #[test]
    fn test_panicking_tracker_is_isolated() {
        let classes = ClassRegistry::new();
        let attrs = AttributeStore::new();
        let resolver = NameResolver::new(&classes, &attrs);
        let coordinator = TrackingCoordinator::new(tracker_fn(|_, _, _, _| panic!("upload failed")));

        assert!(coordinator.consult(&record("checkout"), &resolver).is_none());
        assert!(coordinator.consult(&record("checkout"), &resolver).is_none());
        assert_eq!(coordinator.failures(), 2);
    }

    #[test]
    fn test_tracker_reads_attributes_through_resolver() {
        let classes = ClassRegistry::new();
        let attrs = AttributeStore::new();
        let resolver = NameResolver::new(&classes, &attrs);
        let rec = record("checkout");
        attrs.register(rec.target(), "uid", Value::from("u-7"));

        let coordinator = TrackingCoordinator::new(tracker_fn(|method, instance, _, resolver| {
            let uid = resolver.read(instance, "uid").ok()?;
            Some(format!("{}@{}", method, uid))
        }));
        let event = coordinator.consult(&rec, &resolver).unwrap();
        assert_eq!(event.identifier, "checkout@u-7");
    }

    #[test]
    fn test_rule_tracker() {
        let config = Arc::new(
            ConfigurationRegistry::from_rules(vec![
                TrackingRule::new("Cart", "checkout").with_event("cart_checkout"),
                TrackingRule::new("Cart", "*"),
            ])
            .unwrap(),
        );
        let classes = ClassRegistry::new();
        classes.register_descriptor(crate::class::ClassBuilder::<Cart>::new("Cart").build());
        let attrs = AttributeStore::new();
        let resolver = NameResolver::new(&classes, &attrs);
        let coordinator = TrackingCoordinator::new(RuleTracker::new(config));

        let event = coordinator.consult(&record("checkout"), &resolver).unwrap();
        assert_eq!(event.identifier, "cart_checkout");
        let event = coordinator.consult(&record("clear"), &resolver).unwrap();
        assert_eq!(event.identifier, "Cart.clear");
    }
}
