//! Beacon SDK - Lightweight types for tracked objects
//!
//! This crate provides the minimal types a host application needs to hand
//! its objects to the Beacon tracking engine without depending on the
//! engine itself:
//!
//! - [`Value`] / [`ValueKind`]: the uniform boxed value every argument,
//!   property and return value is normalized into
//! - [`ReturnValue`]: a call's single return slot, with an explicit
//!   "no value" marker for void operations
//! - [`Instance`] / [`WeakInstance`]: type-erased handles with reference
//!   identity
//! - [`ResolveError`] / [`CaptureError`]: the resolution error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use beacon_sdk::{Instance, Value};
//!
//! struct Cart { items: Vec<String> }
//!
//! let cart = Instance::new(Cart { items: vec![] });
//! let same = cart.clone();
//! assert_eq!(cart.id(), same.id());
//!
//! let args: Vec<Value> = vec![Value::from("sku-1"), Value::from(2)];
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod instance;
pub mod value;

pub use convert::{FromValue, IntoReturn};
pub use error::{CaptureError, ResolveError, ResolveResult};
pub use instance::{Instance, InstanceId, WeakInstance};
pub use value::{ReturnValue, Value, ValueKind};
