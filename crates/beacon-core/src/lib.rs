//! Beacon core - dynamic resolution and call tracking engine
//!
//! Tracks method calls and property reads on arbitrary host objects without
//! modifying them:
//!
//! - [`ClassRegistry`]: per-type member tables built from [`Describable`]
//! - [`AttributeStore`]: weakly keyed extra properties
//! - [`NameResolver`]: native-then-extra attribute resolution
//! - [`ArgumentList`] / [`InvocationRecord`]: invocation capture
//! - [`Dispatcher`]: call by name with arity/type checking
//! - [`TrackingCoordinator`] / [`EventTracker`]: pluggable event decisions
//! - [`ConfigurationRegistry`]: tracking eligibility rules
//! - [`Beacon`]: facade tying the pieces together
//!
//! # Example
//!
//! ```ignore
//! use beacon_core::{Beacon, ClassBuilder, Describable, RuleTracker, TrackingRule};
//! use beacon_core::{ConfigurationRegistry, Instance, ValueKind};
//! use std::sync::Arc;
//!
//! struct Cart;
//!
//! impl Describable for Cart {
//!     fn class_name() -> &'static str { "Cart" }
//!     fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
//!         class.method("checkout", &[ValueKind::Str], |_, args| format!("order-{}", args[0]))
//!     }
//! }
//!
//! let config = Arc::new(ConfigurationRegistry::from_rules(vec![
//!     TrackingRule::new("Cart", "checkout").with_event("cart_checkout"),
//! ])?);
//! let beacon = Beacon::builder()
//!     .configuration(config.clone())
//!     .tracker(RuleTracker::new(config))
//!     .build();
//! beacon.register::<Cart>();
//!
//! let out = beacon.invoke(&Instance::new(Cart), "checkout", ("sku-1",))?;
//! assert_eq!(out.event.unwrap().identifier, "cart_checkout");
//! ```

pub mod attributes;
pub mod class;
pub mod config;
pub mod dispatch;
pub mod invocation;
pub mod resolver;
pub mod runtime;
pub mod tracker;

pub use attributes::AttributeStore;
pub use class::{ClassBuilder, ClassDescriptor, ClassRegistry, Describable, Member, MemberKind, MethodSlot};
pub use config::{ConfigError, ConfigurationRegistry, TrackingRule, WILDCARD};
pub use dispatch::{Dispatched, Dispatcher};
pub use invocation::{ArgumentList, IntoArguments, InvocationRecord};
pub use resolver::{NameResolver, Origin, ResolvedTarget};
pub use runtime::{Beacon, BeaconBuilder};
pub use tracker::{tracker_fn, EventTracker, FnTracker, RuleTracker, TrackingCoordinator, TrackingEvent};

pub use beacon_sdk::{
    CaptureError, FromValue, Instance, InstanceId, IntoReturn, ResolveError, ResolveResult, ReturnValue, Value,
    ValueKind, WeakInstance,
};
