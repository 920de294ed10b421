//! Property-bag view of management-plane objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PlaneError;

/// A single object returned by, or submitted to, the management plane.
///
/// Properties are kept as JSON values because the plane's own variant type
/// is dynamically typed. Typed accessors report a missing or mistyped
/// property as [`PlaneError::MissingProperty`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

impl Instance {
    /// Creates an empty instance of the given class with no object path.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            path: None,
            properties: BTreeMap::new(),
        }
    }

    /// Attaches the object path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets a property, builder style.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Class name of the instance.
    #[must_use]
    pub fn class(&self) -> &str {
        self.class.as_str()
    }

    /// Object path, required to reference the instance in method calls.
    pub fn path(&self) -> Result<&str, PlaneError> {
        self.path
            .as_deref()
            .ok_or_else(|| PlaneError::missing_path(&self.class))
    }

    /// Sets or replaces a property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Raw property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// String property.
    pub fn str_property(&self, name: &str) -> Result<&str, PlaneError> {
        self.property(name)
            .and_then(Value::as_str)
            .ok_or_else(|| PlaneError::missing_property(&self.class, name))
    }

    /// Integer property.
    pub fn i64_property(&self, name: &str) -> Result<i64, PlaneError> {
        self.property(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| PlaneError::missing_property(&self.class, name))
    }

    /// Returns `true` when the property exists and equals `expected`.
    #[must_use]
    pub fn property_equals(&self, name: &str, expected: &Value) -> bool {
        self.property(name) == Some(expected)
    }
}
