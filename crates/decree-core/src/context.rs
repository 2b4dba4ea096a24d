//! Evaluation context
//!
//! The context is the open-ended key/value world state a run evaluates
//! against. It is never mutated in place: each recursion level derives a new
//! context with its own `results` entry, leaving the parent's view intact.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key/value state threaded through a run
///
/// Internally always a JSON object; construction from any other JSON shape
/// is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    inner: Value,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self {
            inner: Value::Object(Map::new()),
        }
    }

    /// Build a context from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(Self { inner: value }),
            other => Err(CoreError::InvalidContext(format!(
                "expected an object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.as_object().and_then(|map| map.get(key))
    }

    /// Set a top-level key
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        if let Some(map) = self.inner.as_object_mut() {
            map.insert(key.into(), value);
        }
    }

    /// View the context as a JSON value
    pub fn as_value(&self) -> &Value {
        &self.inner
    }

    /// Consume the context into its JSON value
    pub fn into_value(self) -> Value {
        self.inner
    }

    /// Derive a new context whose `results` entry is replaced
    ///
    /// The parent context is left untouched; only the returned copy carries
    /// the given results.
    pub fn with_results(&self, results: Value) -> Self {
        let mut next = self.clone();
        next.insert("results", results);
        next
    }

    pub fn len(&self) -> usize {
        self.inner.as_object().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            inner: Value::Object(map),
        }
    }
}

impl TryFrom<Value> for Context {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Context::from_value(value).map_err(serde::de::Error::custom)
    }
}
