//! Beacon facade
//!
//! Owns the class registry, attribute store and configuration registry,
//! and exposes the property-access and dynamic-call surface hosts use on
//! arbitrary instances:
//!
//! - `property(obj, name)`: native-or-extra attribute read
//! - `extra_property(obj, name)`: extra-only read
//! - `add_extra_property(obj, name, default)`: registration
//! - `perform_selector(obj, name, args)`: call by name

use std::path::Path;
use std::sync::Arc;

use beacon_sdk::{Instance, ResolveResult, ReturnValue, Value};

use crate::attributes::AttributeStore;
use crate::class::{ClassDescriptor, ClassRegistry, Describable};
use crate::config::{ConfigError, ConfigurationRegistry};
use crate::dispatch::{Dispatched, Dispatcher};
use crate::invocation::IntoArguments;
use crate::resolver::NameResolver;
use crate::tracker::{EventTracker, TrackingCoordinator};

/// Builder for [`Beacon`]
#[derive(Default)]
pub struct BeaconBuilder {
    classes: Option<Arc<ClassRegistry>>,
    attributes: Option<Arc<AttributeStore>>,
    config: Option<Arc<ConfigurationRegistry>>,
    tracker: Option<Arc<dyn EventTracker>>,
}

impl BeaconBuilder {
    /// Share an existing class registry
    pub fn classes(mut self, classes: Arc<ClassRegistry>) -> Self {
        self.classes = Some(classes);
        self
    }

    /// Share an existing attribute store
    pub fn attributes(mut self, attributes: Arc<AttributeStore>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Inject the configuration registry
    pub fn configuration(mut self, config: Arc<ConfigurationRegistry>) -> Self {
        self.config = Some(config);
        self
    }

    /// Install the event tracker
    pub fn tracker(mut self, tracker: impl EventTracker + 'static) -> Self {
        self.tracker = Some(Arc::new(tracker));
        self
    }

    /// Finish construction
    pub fn build(self) -> Beacon {
        let classes = self.classes.unwrap_or_default();
        let attributes = self.attributes.unwrap_or_default();
        let config = self.config.unwrap_or_default();

        let mut dispatcher = Dispatcher::new(classes.clone(), attributes.clone(), config.clone());
        if let Some(tracker) = self.tracker {
            dispatcher = dispatcher.with_coordinator(TrackingCoordinator::from_arc(tracker));
        }

        Beacon {
            classes,
            attributes,
            config,
            dispatcher,
        }
    }
}

/// Call-tracking runtime.
pub struct Beacon {
    classes: Arc<ClassRegistry>,
    attributes: Arc<AttributeStore>,
    config: Arc<ConfigurationRegistry>,
    dispatcher: Dispatcher,
}

impl Beacon {
    /// Start building a runtime
    pub fn builder() -> BeaconBuilder {
        BeaconBuilder::default()
    }

    // ========================================================================
    // Registration and configuration lifecycle
    // ========================================================================

    /// Register a [`Describable`] type
    pub fn register<T: Describable>(&self) -> Arc<ClassDescriptor> {
        self.classes.register::<T>()
    }

    /// Replace the tracking configuration from a file
    pub fn load_configuration(&self, path: &Path) -> Result<usize, ConfigError> {
        let count = self.config.load_file(path)?;
        tracing::info!(path = %path.display(), rules = count, "tracking configuration loaded");
        Ok(count)
    }

    /// Drop every tracking rule
    pub fn clear_configuration(&self) {
        self.config.clear();
    }

    // ========================================================================
    // Property access
    // ========================================================================

    /// Read a native property, falling back to an extra property
    pub fn property(&self, instance: &Instance, name: &str) -> ResolveResult<Value> {
        self.resolver().read(instance, name)
    }

    /// Write a native property, falling back to an existing extra property
    pub fn set_property(&self, instance: &Instance, name: &str, value: Value) -> ResolveResult<()> {
        self.resolver().resolve(instance, name)?.write(value)
    }

    /// Read an extra property only
    pub fn extra_property(&self, instance: &Instance, name: &str) -> ResolveResult<Value> {
        self.resolver().resolve_extra(instance, name)?.read()
    }

    /// Register an extra property (last registration wins)
    pub fn add_extra_property(&self, instance: &Instance, name: &str, default: impl Into<Value>) {
        self.attributes.register(instance, name, default.into());
    }

    /// Write an extra property, registering it if needed
    pub fn set_extra_property(&self, instance: &Instance, name: &str, value: impl Into<Value>) {
        self.attributes.set(instance, name, value.into());
    }

    // ========================================================================
    // Dynamic calls
    // ========================================================================

    /// Execute a named operation and return its result
    pub fn perform_selector(
        &self,
        instance: &Instance,
        name: &str,
        args: impl IntoArguments,
    ) -> ResolveResult<ReturnValue> {
        self.dispatcher.invoke(instance, name, args).map(|out| out.value)
    }

    /// Execute a named operation, keeping the invocation record and event
    pub fn invoke(&self, instance: &Instance, name: &str, args: impl IntoArguments) -> ResolveResult<Dispatched> {
        self.dispatcher.invoke(instance, name, args)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Resolver over this runtime's registries
    pub fn resolver(&self) -> NameResolver<'_> {
        self.dispatcher.resolver()
    }

    /// Class registry
    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    /// Attribute store
    pub fn attributes(&self) -> &Arc<AttributeStore> {
        &self.attributes
    }

    /// Configuration registry
    pub fn configuration(&self) -> &Arc<ConfigurationRegistry> {
        &self.config
    }

    /// Number of tracker invocations that panicked
    pub fn tracking_failures(&self) -> u64 {
        self.dispatcher
            .coordinator()
            .map_or(0, TrackingCoordinator::failures)
    }
}

impl Default for Beacon {
    fn default() -> Self {
        Self::builder().build()
    }
}
