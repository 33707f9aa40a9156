//! Error types for name resolution and invocation capture

use crate::value::ValueKind;

/// Result type for resolution and dispatch
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Failure to map a name to an attribute or operation on an instance.
///
/// Always returned as a value to the immediate caller; a failed resolution
/// never panics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// Name did not resolve to any attribute or operation
    #[error("'{name}' not found on {class}")]
    NotFound {
        /// Class (or type) name of the target instance
        class: String,
        /// The name that failed to resolve
        name: String,
    },

    /// Argument count does not match the resolved operation's signature
    #[error("{class}.{name} takes {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Class name of the target instance
        class: String,
        /// Operation name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// An argument's kind does not match the declared parameter kind
    #[error("{class}.{name}: argument {index} expected {expected}, got {got}")]
    TypeMismatch {
        /// Class name of the target instance
        class: String,
        /// Operation or property name
        name: String,
        /// Zero-based position of the offending argument
        index: usize,
        /// Declared kind
        expected: ValueKind,
        /// Supplied kind
        got: ValueKind,
    },

    /// Write to a native property that has no setter
    #[error("'{name}' on {class} is read-only")]
    ReadOnly {
        /// Class name of the target instance
        class: String,
        /// Property name
        name: String,
    },
}

impl ResolveError {
    /// Create a `NotFound` error
    pub fn not_found(class: impl Into<String>, name: impl Into<String>) -> Self {
        ResolveError::NotFound {
            class: class.into(),
            name: name.into(),
        }
    }

    /// Check if this is a `NotFound` error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}

/// Misuse of an invocation record's write-once return slot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The return value was already captured for this record
    #[error("return value of '{method}' already captured")]
    DoubleCapture {
        /// Operation name of the record
        method: String,
    },
}
