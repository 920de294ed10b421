//! Errors reported by management-plane implementations.

use thiserror::Error;

/// Failure of a single management-plane call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaneError {
    /// The query matched no object. Legitimate absence, not a fault.
    #[error("no {class} object matched the query")]
    NotFound { class: String },
    /// The underlying call failed.
    #[error("{operation}: {message}")]
    Call { operation: String, message: String },
    /// An object lacked a property the caller relies on, or it had the wrong type.
    #[error("{class} object has no usable '{property}' property")]
    MissingProperty { class: String, property: String },
    /// An object has no path and cannot be referenced in a method call.
    #[error("{class} object has no object path")]
    MissingPath { class: String },
}

impl PlaneError {
    /// Creates a not-found error for the given class.
    pub fn not_found(class: impl Into<String>) -> Self {
        Self::NotFound {
            class: class.into(),
        }
    }

    /// Creates a call failure.
    pub fn call(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Call {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a missing-property error.
    pub fn missing_property(class: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingProperty {
            class: class.into(),
            property: property.into(),
        }
    }

    /// Creates a missing-path error.
    pub fn missing_path(class: impl Into<String>) -> Self {
        Self::MissingPath {
            class: class.into(),
        }
    }

    /// Returns `true` when the error denotes legitimate absence.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
