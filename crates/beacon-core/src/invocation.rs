//! Invocation capture
//!
//! [`ArgumentList`] normalizes an arbitrary-arity, arbitrary-type argument
//! list into an ordered, immutable sequence of [`Value`]s.
//! [`InvocationRecord`] wraps one intercepted call and carries its
//! write-once return slot.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use beacon_sdk::{CaptureError, FromValue, Instance, IntoReturn, ReturnValue, Value};
use once_cell::sync::OnceCell;
use serde::ser::{Serialize, Serializer};

/// Raw positional arguments that can be normalized into [`Value`]s.
///
/// Implemented for tuples of up to eight `Into<Value>` elements, vectors,
/// arrays and value slices.
pub trait IntoArguments {
    /// Box every argument, preserving order
    fn into_arguments(self) -> Vec<Value>;
}

impl IntoArguments for () {
    fn into_arguments(self) -> Vec<Value> {
        Vec::new()
    }
}

impl<T: Into<Value>> IntoArguments for Vec<T> {
    fn into_arguments(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value>, const N: usize> IntoArguments for [T; N] {
    fn into_arguments(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl IntoArguments for &[Value] {
    fn into_arguments(self) -> Vec<Value> {
        self.to_vec()
    }
}

impl IntoArguments for &ArgumentList {
    fn into_arguments(self) -> Vec<Value> {
        self.to_vec()
    }
}

macro_rules! impl_into_arguments_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> IntoArguments for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_arguments(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

impl_into_arguments_for_tuple!(A);
impl_into_arguments_for_tuple!(A, B);
impl_into_arguments_for_tuple!(A, B, C);
impl_into_arguments_for_tuple!(A, B, C, D);
impl_into_arguments_for_tuple!(A, B, C, D, E);
impl_into_arguments_for_tuple!(A, B, C, D, E, F);
impl_into_arguments_for_tuple!(A, B, C, D, E, F, G);
impl_into_arguments_for_tuple!(A, B, C, D, E, F, G, H);

/// Ordered, immutable argument list of one call. Cheap to clone.
#[derive(Clone, PartialEq, Default)]
pub struct ArgumentList(Arc<[Value]>);

impl ArgumentList {
    /// Normalize raw arguments
    pub fn capture(raw: impl IntoArguments) -> Self {
        Self::from_values(raw.into_arguments())
    }

    /// Wrap already-boxed values
    pub fn from_values(values: Vec<Value>) -> Self {
        Self(values.into())
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no arguments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Argument at a position
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Argument at a position, converted to `T`
    pub fn get_as<T: FromValue>(&self, index: usize) -> Option<T> {
        self.get(index).and_then(T::from_value)
    }

    /// Borrow all arguments
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Copy out the arguments
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.to_vec()
    }
}

impl Index<usize> for ArgumentList {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a ArgumentList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for ArgumentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl Serialize for ArgumentList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// One intercepted call: target, operation, arguments and return slot.
pub struct InvocationRecord {
    target: Instance,
    class: String,
    method: String,
    arguments: ArgumentList,
    returned: OnceCell<ReturnValue>,
}

impl InvocationRecord {
    /// Start a record for a call whose arguments were already captured
    pub fn new(
        target: Instance,
        class: impl Into<String>,
        method: impl Into<String>,
        arguments: ArgumentList,
    ) -> Self {
        Self {
            target,
            class: class.into(),
            method: method.into(),
            arguments,
            returned: OnceCell::new(),
        }
    }

    /// Target instance
    pub fn target(&self) -> &Instance {
        &self.target
    }

    /// Class name of the target
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Operation name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Captured arguments
    pub fn arguments(&self) -> &ArgumentList {
        &self.arguments
    }

    /// Capture the operation's result. Only the first capture is kept.
    ///
    /// A second capture is a programming error: it panics when debug
    /// assertions are enabled. Otherwise it is rejected with
    /// [`CaptureError::DoubleCapture`] and the stored value is untouched.
    pub fn capture_return(&self, raw: impl IntoReturn) -> Result<(), CaptureError> {
        self.returned.set(raw.into_return()).map_err(|_| {
            tracing::error!(
                class = %self.class,
                method = %self.method,
                "return value captured twice"
            );
            if cfg!(debug_assertions) {
                panic!("return value of {}.{} captured twice", self.class, self.method);
            }
            CaptureError::DoubleCapture {
                method: self.method.clone(),
            }
        })
    }

    /// Captured result, `None` until the operation has completed
    pub fn return_value(&self) -> Option<&ReturnValue> {
        self.returned.get()
    }

    /// Check if the return slot has been filled
    pub fn is_complete(&self) -> bool {
        self.returned.get().is_some()
    }
}

impl fmt::Debug for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationRecord")
            .field("target", &self.target)
            .field("class", &self.class)
            .field("method", &self.method)
            .field("arguments", &self.arguments)
            .field("returned", &self.returned.get())
            .finish()
    }
}
