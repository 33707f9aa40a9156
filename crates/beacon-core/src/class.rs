//! Class descriptors and the per-type registration table
//!
//! Trackable types expose their members through an explicit capability
//! instead of language-level reflection: each type implements
//! [`Describable`] (or hands a [`ClassBuilder`]-built descriptor to the
//! registry directly), listing its readable/writable properties and its
//! invokable methods by name. The [`ClassRegistry`] is populated at startup
//! and indexed by `TypeId`, so resolving a member for an [`Instance`] is a
//! hash lookup followed by a downcast.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use beacon_sdk::{Instance, IntoReturn, ResolveError, ResolveResult, ReturnValue, Value, ValueKind};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

type ErasedGetter = Arc<dyn Fn(&Instance) -> Option<Value> + Send + Sync>;
type ErasedSetter = Arc<dyn Fn(&Instance, Value) -> bool + Send + Sync>;
type ErasedMethod = Arc<dyn Fn(&Instance, &[Value]) -> Option<ReturnValue> + Send + Sync>;

/// A type that can describe its own members to the tracking engine.
pub trait Describable: Any + Send + Sync + Sized {
    /// Name the class is registered (and matched against rules) under
    fn class_name() -> &'static str;

    /// Declare properties and methods on the builder
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self>;
}

/// A native property: getter plus optional typed setter
#[derive(Clone)]
struct PropertySlot {
    getter: ErasedGetter,
    setter: Option<(ValueKind, ErasedSetter)>,
}

/// A native method: declared parameter kinds plus erased body
#[derive(Clone)]
pub struct MethodSlot {
    params: Vec<ValueKind>,
    body: ErasedMethod,
}

impl MethodSlot {
    /// Declared parameter kinds, in order
    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    /// Check an argument slice against the declared signature
    pub fn check(&self, class: &str, name: &str, args: &[Value]) -> ResolveResult<()> {
        if args.len() != self.params.len() {
            return Err(ResolveError::ArityMismatch {
                class: class.to_string(),
                name: name.to_string(),
                expected: self.params.len(),
                got: args.len(),
            });
        }

        for (index, (expected, arg)) in self.params.iter().zip(args).enumerate() {
            if !expected.accepts(arg.kind()) {
                return Err(ResolveError::TypeMismatch {
                    class: class.to_string(),
                    name: name.to_string(),
                    index,
                    expected: *expected,
                    got: arg.kind(),
                });
            }
        }
        Ok(())
    }

    /// Execute the body; `None` if the instance is not of the described type
    pub fn call(&self, instance: &Instance, args: &[Value]) -> Option<ReturnValue> {
        (self.body)(instance, args)
    }
}

/// Kind of a listed member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    /// Readable property
    Property {
        /// Whether the property has a setter
        writable: bool,
    },
    /// Invokable method
    Method {
        /// Declared parameter kinds
        params: Vec<ValueKind>,
    },
}

/// One entry of [`ClassDescriptor::members`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Member name
    pub name: String,
    /// Property or method
    pub kind: MemberKind,
}

/// Builder for a [`ClassDescriptor`] over a concrete type `T`.
pub struct ClassBuilder<T> {
    name: String,
    properties: FxHashMap<String, PropertySlot>,
    property_names: Vec<String>,
    methods: FxHashMap<String, MethodSlot>,
    method_names: Vec<String>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
    /// Start describing a class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: FxHashMap::default(),
            property_names: Vec::new(),
            methods: FxHashMap::default(),
            method_names: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declare a read-only property
    pub fn property<V, F>(mut self, name: &str, getter: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.insert_property(name, erase_getter(getter), None);
        self
    }

    /// Declare a writable property. The setter only sees values of `kind`
    /// (or any value if `kind` is [`ValueKind::Any`]).
    pub fn writable_property<V, G, S>(mut self, name: &str, kind: ValueKind, getter: G, setter: S) -> Self
    where
        V: Into<Value>,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, Value) + Send + Sync + 'static,
    {
        let setter: ErasedSetter = Arc::new(move |instance: &Instance, value: Value| {
            match instance.downcast_ref::<T>() {
                Some(this) => {
                    setter(this, value);
                    true
                }
                None => false,
            }
        });
        self.insert_property(name, erase_getter(getter), Some((kind, setter)));
        self
    }

    /// Declare a method taking positional arguments of the given kinds
    pub fn method<R, F>(mut self, name: &str, params: &[ValueKind], body: F) -> Self
    where
        R: IntoReturn,
        F: Fn(&T, &[Value]) -> R + Send + Sync + 'static,
    {
        let body: ErasedMethod = Arc::new(move |instance: &Instance, args: &[Value]| {
            instance
                .downcast_ref::<T>()
                .map(|this| body(this, args).into_return())
        });

        if self
            .methods
            .insert(
                name.to_string(),
                MethodSlot {
                    params: params.to_vec(),
                    body,
                },
            )
            .is_none()
        {
            self.method_names.push(name.to_string());
        }
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> ClassDescriptor {
        ClassDescriptor {
            name: self.name,
            type_id: TypeId::of::<T>(),
            properties: self.properties,
            property_names: self.property_names,
            methods: self.methods,
            method_names: self.method_names,
        }
    }

    fn insert_property(
        &mut self,
        name: &str,
        getter: ErasedGetter,
        setter: Option<(ValueKind, ErasedSetter)>,
    ) {
        if self
            .properties
            .insert(name.to_string(), PropertySlot { getter, setter })
            .is_none()
        {
            self.property_names.push(name.to_string());
        }
    }
}

fn erase_getter<T, V, F>(getter: F) -> ErasedGetter
where
    T: Any + Send + Sync,
    V: Into<Value>,
    F: Fn(&T) -> V + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| instance.downcast_ref::<T>().map(|this| getter(this).into()))
}

/// Member table for one registered type
pub struct ClassDescriptor {
    name: String,
    type_id: TypeId,
    properties: FxHashMap<String, PropertySlot>,
    property_names: Vec<String>,
    methods: FxHashMap<String, MethodSlot>,
    method_names: Vec<String>,
}

impl ClassDescriptor {
    /// Registered class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `TypeId` of the described Rust type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Property names in declaration order
    pub fn property_names(&self) -> &[String] {
        &self.property_names
    }

    /// Method names in declaration order
    pub fn method_names(&self) -> &[String] {
        &self.method_names
    }

    /// All members, properties first
    pub fn members(&self) -> Vec<Member> {
        let properties = self.property_names.iter().map(|name| Member {
            name: name.clone(),
            kind: MemberKind::Property {
                writable: self.properties[name].setter.is_some(),
            },
        });
        let methods = self.method_names.iter().map(|name| Member {
            name: name.clone(),
            kind: MemberKind::Method {
                params: self.methods[name].params.clone(),
            },
        });
        properties.chain(methods).collect()
    }

    /// Check if property exists
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Check if method exists
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&MethodSlot> {
        self.methods.get(name)
    }

    /// Read a native property; `None` if absent or the instance has another type
    pub fn read_property(&self, instance: &Instance, name: &str) -> Option<Value> {
        let slot = self.properties.get(name)?;
        (slot.getter)(instance)
    }

    /// Write a native property
    pub fn write_property(&self, instance: &Instance, name: &str, value: Value) -> ResolveResult<()> {
        let slot = self
            .properties
            .get(name)
            .ok_or_else(|| ResolveError::not_found(&self.name, name))?;

        let (kind, setter) = slot.setter.as_ref().ok_or_else(|| ResolveError::ReadOnly {
            class: self.name.clone(),
            name: name.to_string(),
        })?;

        if !kind.accepts(value.kind()) {
            return Err(ResolveError::TypeMismatch {
                class: self.name.clone(),
                name: name.to_string(),
                index: 0,
                expected: *kind,
                got: value.kind(),
            });
        }

        if setter(instance, value) {
            Ok(())
        } else {
            Err(ResolveError::not_found(&self.name, name))
        }
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("properties", &self.property_names)
            .field("methods", &self.method_names)
            .finish()
    }
}

#[derive(Default)]
struct Classes {
    by_type: FxHashMap<TypeId, Arc<ClassDescriptor>>,
    by_name: FxHashMap<String, TypeId>,
}

/// Registry of class descriptors, indexed by `TypeId` and by name.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<Classes>,
}

impl ClassRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a [`Describable`] type
    pub fn register<T: Describable>(&self) -> Arc<ClassDescriptor> {
        let descriptor = T::describe(ClassBuilder::new(T::class_name())).build();
        self.register_descriptor(descriptor)
    }

    /// Register a hand-built descriptor. Re-registering a type replaces it.
    pub fn register_descriptor(&self, descriptor: ClassDescriptor) -> Arc<ClassDescriptor> {
        let descriptor = Arc::new(descriptor);
        let mut classes = self.classes.write();

        if let Some(previous) = classes.by_type.insert(descriptor.type_id, descriptor.clone()) {
            // The old name may already belong to another type
            if classes.by_name.get(previous.name()) == Some(&descriptor.type_id) {
                classes.by_name.remove(previous.name());
            }
        }
        classes
            .by_name
            .insert(descriptor.name.clone(), descriptor.type_id);

        tracing::debug!(
            class = %descriptor.name,
            properties = descriptor.property_names.len(),
            methods = descriptor.method_names.len(),
            "registered class"
        );
        descriptor
    }

    /// Get the descriptor for a `TypeId`
    pub fn get(&self, type_id: TypeId) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().by_type.get(&type_id).cloned()
    }

    /// Get the descriptor registered under a class name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        let classes = self.classes.read();
        let type_id = classes.by_name.get(name)?;
        classes.by_type.get(type_id).cloned()
    }

    /// Get the descriptor for an instance's type
    pub fn for_instance(&self, instance: &Instance) -> Option<Arc<ClassDescriptor>> {
        self.get(instance.type_id())
    }

    /// Class name for an instance: the registered name, or the Rust type name
    pub fn class_name_of(&self, instance: &Instance) -> String {
        match self.for_instance(instance) {
            Some(class) => class.name.clone(),
            None => instance.type_name().to_string(),
        }
    }

    /// All registered class names, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.read().by_type.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.read().by_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Counter {
        count: Mutex<i64>,
        label: &'static str,
    }

    impl Describable for Counter {
        fn class_name() -> &'static str {
            "Counter"
        }

        fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
            class
                .property("label", |c: &Counter| c.label)
                .writable_property(
                    "count",
                    ValueKind::Int,
                    |c: &Counter| *c.count.lock(),
                    |c: &Counter, v| {
                        if let Some(n) = v.as_int() {
                            *c.count.lock() = n;
                        }
                    },
                )
                .method("add", &[ValueKind::Int], |c: &Counter, args| {
                    let mut count = c.count.lock();
                    *count += args[0].as_int().unwrap_or(0);
                    *count
                })
                .method("reset", &[], |c: &Counter, _| {
                    *c.count.lock() = 0;
                })
        }
    }

    fn counter() -> Instance {
        Instance::new(Counter {
            count: Mutex::new(0),
            label: "clicks",
        })
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ClassRegistry::new();
        assert!(registry.is_empty());
        registry.register::<Counter>();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.class_names(), vec!["Counter".to_string()]);
        assert!(registry.get_by_name("Counter").is_some());
        assert_eq!(registry.class_name_of(&counter()), "Counter");
        assert_eq!(registry.class_name_of(&Instance::new(1u8)), "u8");
    }

    #[test]
    fn test_members_in_declaration_order() {
        let registry = ClassRegistry::new();
        let class = registry.register::<Counter>();

        assert_eq!(class.property_names(), &["label", "count"]);
        assert_eq!(class.method_names(), &["add", "reset"]);

        let members = class.members();
        assert_eq!(members.len(), 4);
        assert_eq!(members[0].kind, MemberKind::Property { writable: false });
        assert_eq!(members[1].kind, MemberKind::Property { writable: true });
        assert_eq!(
            members[2].kind,
            MemberKind::Method {
                params: vec![ValueKind::Int]
            }
        );
    }

    #[test]
    fn test_read_write_property() {
        let registry = ClassRegistry::new();
        let class = registry.register::<Counter>();
        let c = counter();

        assert_eq!(class.read_property(&c, "label"), Some(Value::from("clicks")));
        assert_eq!(class.read_property(&c, "missing"), None);

        class.write_property(&c, "count", Value::Int(5)).unwrap();
        assert_eq!(class.read_property(&c, "count"), Some(Value::Int(5)));

        let err = class.write_property(&c, "label", Value::from("x")).unwrap_err();
        assert!(matches!(err, ResolveError::ReadOnly { .. }));

        let err = class.write_property(&c, "count", Value::from("x")).unwrap_err();
        assert!(matches!(err, ResolveError::TypeMismatch { index: 0, .. }));
    }

    #[test]
    fn test_method_check_and_call() {
        let registry = ClassRegistry::new();
        let class = registry.register::<Counter>();
        let c = counter();
        let add = class.method("add").unwrap();

        assert!(add.check("Counter", "add", &[Value::Int(1)]).is_ok());
        assert!(matches!(
            add.check("Counter", "add", &[]),
            Err(ResolveError::ArityMismatch { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            add.check("Counter", "add", &[Value::Bool(true)]),
            Err(ResolveError::TypeMismatch { .. })
        ));

        assert_eq!(
            add.call(&c, &[Value::Int(3)]),
            Some(ReturnValue::Value(Value::Int(3)))
        );
        assert_eq!(
            class.method("reset").unwrap().call(&c, &[]),
            Some(ReturnValue::NoValue)
        );
        // Wrong concrete type never reaches the body
        assert_eq!(add.call(&Instance::new(0u8), &[Value::Int(1)]), None);
    }

    #[test]
    fn test_reregister_replaces() {
        let registry = ClassRegistry::new();
        registry.register::<Counter>();
        registry.register_descriptor(ClassBuilder::<Counter>::new("Tally").build());

        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_name("Counter").is_none());
        let class = registry.get_by_name("Tally").unwrap();
        assert!(!class.has_method("add"));
    }

    #[test]
    fn test_reregister_keeps_name_claimed_by_other_type() {
        struct Gauge;

        let registry = ClassRegistry::new();
        registry.register_descriptor(ClassBuilder::<Counter>::new("Shared").build());
        registry.register_descriptor(ClassBuilder::<Gauge>::new("Shared").build());
        registry.register_descriptor(ClassBuilder::<Counter>::new("Other").build());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.class_names(), vec!["Other".to_string(), "Shared".to_string()]);
        assert_eq!(
            ClassDescriptor::type_id(&registry.get_by_name("Shared").unwrap()),
            TypeId::of::<Gauge>()
        );
        assert_eq!(
            ClassDescriptor::type_id(&registry.get_by_name("Other").unwrap()),
            TypeId::of::<Counter>()
        );
    }
}
