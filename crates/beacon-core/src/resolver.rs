//! Name resolution for attribute reads and writes
//!
//! Resolution order, first match wins:
//! 1. native property declared on the instance's registered class
//! 2. extra property in the [`AttributeStore`]
//! 3. `NotFound`
//!
//! Lookups are pure. A missing name is reported as
//! [`ResolveError::NotFound`]; callers decide whether that is fatal.

use std::sync::Arc;

use beacon_sdk::{Instance, ResolveError, ResolveResult, Value};

use crate::attributes::AttributeStore;
use crate::class::{ClassDescriptor, ClassRegistry};

/// Where a resolved name lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Declared on the class descriptor
    Native,
    /// Registered in the attribute store
    Extra,
}

enum Binding<'a> {
    Native(Arc<ClassDescriptor>),
    Extra(&'a AttributeStore),
}

/// A readable/writable binding produced by [`NameResolver::resolve`]
pub struct ResolvedTarget<'a> {
    instance: &'a Instance,
    name: &'a str,
    binding: Binding<'a>,
}

impl<'a> ResolvedTarget<'a> {
    /// Where the name resolved
    pub fn origin(&self) -> Origin {
        match self.binding {
            Binding::Native(_) => Origin::Native,
            Binding::Extra(_) => Origin::Extra,
        }
    }

    /// Resolved name
    pub fn name(&self) -> &str {
        self.name
    }

    /// Read the current value
    pub fn read(&self) -> ResolveResult<Value> {
        let value = match &self.binding {
            Binding::Native(class) => class.read_property(self.instance, self.name),
            Binding::Extra(store) => store.get(self.instance, self.name),
        };
        value.ok_or_else(|| self.not_found())
    }

    /// Write a new value
    pub fn write(&self, value: Value) -> ResolveResult<()> {
        match &self.binding {
            Binding::Native(class) => class.write_property(self.instance, self.name, value),
            Binding::Extra(store) => {
                store.set(self.instance, self.name, value);
                Ok(())
            }
        }
    }

    fn not_found(&self) -> ResolveError {
        let class = match &self.binding {
            Binding::Native(class) => class.name().to_string(),
            Binding::Extra(_) => self.instance.type_name().to_string(),
        };
        ResolveError::not_found(class, self.name)
    }
}

/// Resolves names against native class members and extra properties.
#[derive(Clone, Copy)]
pub struct NameResolver<'a> {
    classes: &'a ClassRegistry,
    attributes: &'a AttributeStore,
}

impl<'a> NameResolver<'a> {
    /// Create a resolver over a class registry and attribute store
    pub fn new(classes: &'a ClassRegistry, attributes: &'a AttributeStore) -> Self {
        Self {
            classes,
            attributes,
        }
    }

    /// Class name used in errors and rule matching for an instance
    pub fn class_name(&self, instance: &Instance) -> String {
        self.classes.class_name_of(instance)
    }

    /// Resolve a name: native property first, then extra property
    pub fn resolve<'b>(&self, instance: &'b Instance, name: &'b str) -> ResolveResult<ResolvedTarget<'b>>
    where
        'a: 'b,
    {
        match self.resolve_native(instance, name) {
            Err(ResolveError::NotFound { .. }) => self.resolve_extra(instance, name),
            found => found,
        }
    }

    /// Resolve against native properties only
    pub fn resolve_native<'b>(
        &self,
        instance: &'b Instance,
        name: &'b str,
    ) -> ResolveResult<ResolvedTarget<'b>>
    where
        'a: 'b,
    {
        if !name.is_empty() {
            if let Some(class) = self.classes.for_instance(instance) {
                if class.has_property(name) {
                    return Ok(ResolvedTarget {
                        instance,
                        name,
                        binding: Binding::Native(class),
                    });
                }
            }
        }
        Err(ResolveError::not_found(self.class_name(instance), name))
    }

    /// Resolve against extra properties only
    pub fn resolve_extra<'b>(
        &self,
        instance: &'b Instance,
        name: &'b str,
    ) -> ResolveResult<ResolvedTarget<'b>>
    where
        'a: 'b,
    {
        if !name.is_empty() && self.attributes.contains(instance, name) {
            return Ok(ResolvedTarget {
                instance,
                name,
                binding: Binding::Extra(self.attributes),
            });
        }
        Err(ResolveError::not_found(self.class_name(instance), name))
    }

    /// Resolve and read in one step
    pub fn read(&self, instance: &Instance, name: &str) -> ResolveResult<Value> {
        self.resolve(instance, name)?.read()
    }
}
