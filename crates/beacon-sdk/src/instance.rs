//! Instance handles with reference identity
//!
//! An [`Instance`] wraps any host object behind an `Arc<dyn Any + Send + Sync>`.
//! Identity is the address of the shared allocation: clones of one handle
//! are the same instance, two separately constructed objects never are,
//! even when their contents compare equal.
//!
//! A [`WeakInstance`] observes an instance without keeping it alive. While a
//! weak handle exists the allocation is not returned to the allocator, so an
//! [`InstanceId`] cannot be reused by a new object until every weak handle
//! to the old one is gone.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

/// Identity key for an instance - its allocation address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    /// Raw address value
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Type-erased, shared handle to a host object.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Instance {
    /// Wrap a value in a new instance
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing shared value; the instance shares its identity
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Identity of this instance
    #[inline]
    pub fn id(&self) -> InstanceId {
        InstanceId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    /// `TypeId` of the wrapped value
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the wrapped value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if the wrapped value is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrow the wrapped value as a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Check whether two handles refer to the same instance
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.id() == other.id()
    }

    /// Create a non-owning handle
    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            inner: Arc::downgrade(&self.inner),
            id: self.id(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }

    /// Number of strong handles (host-held `Arc`s included)
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({} @ {})", self.type_name, self.id())
    }
}

/// Non-owning handle to an [`Instance`]
#[derive(Clone)]
pub struct WeakInstance {
    inner: Weak<dyn Any + Send + Sync>,
    id: InstanceId,
    type_id: TypeId,
    type_name: &'static str,
}

impl WeakInstance {
    /// Identity of the observed instance (stable even after it is dropped)
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Rust type name of the observed value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if the observed instance is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Recover a strong handle if the instance is still alive
    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(|inner| Instance {
            inner,
            type_id: self.type_id,
            type_name: self.type_name,
        })
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WeakInstance({} @ {}, alive={})",
            self.type_name,
            self.id,
            self.is_alive()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_identity_is_reference_identity() {
        let a = Instance::new(Point { x: 1, y: 2 });
        let b = Instance::new(Point { x: 1, y: 2 });
        let a2 = a.clone();

        assert_eq!(a, a2);
        assert_eq!(a.id(), a2.id());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_from_arc_shares_identity() {
        let shared = Arc::new(Point { x: 0, y: 0 });
        let a = Instance::from_arc(shared.clone());
        let b = Instance::from_arc(shared.clone());
        assert_eq!(a, b);
        assert_eq!(a.id().as_usize(), Arc::as_ptr(&shared) as usize);
    }

    #[test]
    fn test_downcast() {
        let a = Instance::new(Point { x: 3, y: 4 });
        assert!(a.is::<Point>());
        assert!(!a.is::<String>());
        assert_eq!(a.downcast_ref::<Point>(), Some(&Point { x: 3, y: 4 }));
        assert!(a.downcast_ref::<String>().is_none());
        assert!(a.type_name().ends_with("Point"));
    }

    #[test]
    fn test_weak_does_not_keep_alive() {
        let a = Instance::new(Point { x: 1, y: 1 });
        let weak = a.downgrade();
        let id = a.id();

        assert!(weak.is_alive());
        assert_eq!(weak.upgrade().map(|i| i.id()), Some(id));

        drop(a);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
        assert_eq!(weak.id(), id);
    }
}
