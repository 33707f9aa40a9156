//! Traits for converting between Rust types and [`Value`]s.
//!
//! `From<T> for Value` covers the boxing direction. [`FromValue`] extracts a
//! typed value back out of an argument, and [`IntoReturn`] normalizes the
//! result of a native method body into a [`ReturnValue`], mapping `()` to the
//! "no value" marker.

use std::collections::BTreeMap;

use crate::instance::Instance;
use crate::value::{ReturnValue, Value};

/// Extract a typed Rust value from a [`Value`].
pub trait FromValue: Sized {
    /// Convert, or `None` if the value has the wrong kind
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int().and_then(|i| u32::try_from(i).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Instance {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Normalize a native method's result into a [`ReturnValue`].
pub trait IntoReturn {
    /// Convert into the return slot representation
    fn into_return(self) -> ReturnValue;
}

impl IntoReturn for () {
    fn into_return(self) -> ReturnValue {
        ReturnValue::NoValue
    }
}

impl IntoReturn for ReturnValue {
    fn into_return(self) -> ReturnValue {
        self
    }
}

macro_rules! impl_into_return {
    ($($ty:ty),*) => {
        $(
            impl IntoReturn for $ty {
                fn into_return(self) -> ReturnValue {
                    ReturnValue::Value(Value::from(self))
                }
            }
        )*
    };
}

impl_into_return!(
    Value, bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, String, &str, Instance,
    BTreeMap<String, Value>
);

impl<T: Into<Value>> IntoReturn for Vec<T> {
    fn into_return(self) -> ReturnValue {
        ReturnValue::Value(Value::from(self))
    }
}

impl<T: Into<Value>> IntoReturn for Option<T> {
    fn into_return(self) -> ReturnValue {
        ReturnValue::Value(Value::from(self))
    }
}
