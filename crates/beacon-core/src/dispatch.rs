//! Dynamic dispatch by operation name
//!
//! The [`Dispatcher`] resolves an operation name against the native methods
//! of an instance's class (never against extra properties, which hold data,
//! not behavior), validates the argument list against the declared
//! signature, executes the method, and for eligible calls records the
//! invocation and consults the tracking coordinator.
//!
//! Eligibility is decided right after method lookup. Raw arguments are
//! always boxed once, since the method body takes [`Value`]s; an ineligible
//! call then runs the method directly and never builds an [`ArgumentList`]
//! or an [`InvocationRecord`], and the tracker is not consulted.
//!
//! [`Value`]: beacon_sdk::Value

use std::sync::Arc;

use beacon_sdk::{Instance, ResolveError, ResolveResult, ReturnValue};

use crate::attributes::AttributeStore;
use crate::class::ClassRegistry;
use crate::config::ConfigurationRegistry;
use crate::invocation::{ArgumentList, IntoArguments, InvocationRecord};
use crate::resolver::NameResolver;
use crate::tracker::{TrackingCoordinator, TrackingEvent};

/// Outcome of a successful dispatch
#[derive(Debug)]
pub struct Dispatched {
    /// The operation's result
    pub value: ReturnValue,
    /// The captured invocation (eligible calls only)
    pub record: Option<InvocationRecord>,
    /// The fired tracking event, if the tracker produced one
    pub event: Option<TrackingEvent>,
}

/// Resolves and executes operations by name.
pub struct Dispatcher {
    classes: Arc<ClassRegistry>,
    attributes: Arc<AttributeStore>,
    config: Arc<ConfigurationRegistry>,
    coordinator: Option<TrackingCoordinator>,
}

impl Dispatcher {
    /// Create a dispatcher without a tracker (every call is ineligible)
    pub fn new(
        classes: Arc<ClassRegistry>,
        attributes: Arc<AttributeStore>,
        config: Arc<ConfigurationRegistry>,
    ) -> Self {
        Self {
            classes,
            attributes,
            config,
            coordinator: None,
        }
    }

    /// Install the tracking coordinator
    pub fn with_coordinator(mut self, coordinator: TrackingCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Resolver over this dispatcher's registries
    pub fn resolver(&self) -> NameResolver<'_> {
        NameResolver::new(&self.classes, &self.attributes)
    }

    /// Installed coordinator, if any
    pub fn coordinator(&self) -> Option<&TrackingCoordinator> {
        self.coordinator.as_ref()
    }

    /// Check whether a call would be tracked
    pub fn is_eligible(&self, class: &str, method: &str) -> bool {
        self.coordinator.is_some() && self.config.is_trackable(class, method)
    }

    /// Resolve and execute `name` on `instance` with positional arguments.
    ///
    /// Arity and kind mismatches are reported before the method runs, so a
    /// failed dispatch has no side effects.
    pub fn invoke(&self, instance: &Instance, name: &str, args: impl IntoArguments) -> ResolveResult<Dispatched> {
        let class = self
            .classes
            .for_instance(instance)
            .ok_or_else(|| ResolveError::not_found(instance.type_name(), name))?;
        let method = class
            .method(name)
            .ok_or_else(|| ResolveError::not_found(class.name(), name))?;

        let coordinator = self
            .coordinator
            .as_ref()
            .filter(|_| self.config.is_trackable(class.name(), name));

        let raw = args.into_arguments();
        method.check(class.name(), name, &raw)?;

        let coordinator = match coordinator {
            Some(coordinator) => coordinator,
            None => {
                let value = method
                    .call(instance, &raw)
                    .ok_or_else(|| ResolveError::not_found(class.name(), name))?;
                return Ok(Dispatched {
                    value,
                    record: None,
                    event: None,
                });
            }
        };

        let record = InvocationRecord::new(
            instance.clone(),
            class.name(),
            name,
            ArgumentList::from_values(raw),
        );
        let value = method
            .call(instance, record.arguments().as_slice())
            .ok_or_else(|| ResolveError::not_found(class.name(), name))?;

        let captured = record.capture_return(value.clone());
        debug_assert!(captured.is_ok(), "fresh record already held a return value");

        tracing::debug!(class = %class.name(), method = %name, "tracked invocation completed");
        let event = coordinator.consult(&record, &self.resolver());

        Ok(Dispatched {
            value,
            record: Some(record),
            event,
        })
    }
}
