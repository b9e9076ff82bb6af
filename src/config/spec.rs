// s3-offload/src/config/spec.rs
use serde::Serialize;
use std::fmt;

use super::ConfigError;

/// Semantic type a configuration value must have once coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecType {
    String,
    Boolean,
    Integer,
}

/// A resolved configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "string {:?}", s),
            Value::Boolean(b) => write!(f, "boolean {}", b),
            Value::Integer(i) => write!(f, "integer {}", i),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

/// Normalizes or rejects an already type-coerced value. Receives the key for error reporting.
///
/// Filters must be pure and idempotent: `filter(filter(x)) == filter(x)`.
pub type Filter = fn(&str, Value) -> Result<Value, ConfigError>;

/// Declared shape of one configuration key.
#[derive(Clone)]
pub struct ValueSpec {
    key: &'static str,
    kind: SpecType,
    default: Option<Value>,
    serializable: bool,
    filter: Option<Filter>,
}

impl ValueSpec {
    pub fn new(key: &'static str, kind: SpecType) -> Self {
        Self {
            key,
            kind,
            default: None,
            serializable: true,
            filter: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Excludes the key from persisted snapshots.
    pub fn transient(mut self) -> Self {
        self.serializable = false;
        self
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn kind(&self) -> SpecType {
        self.kind
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    /// Coerces a raw value to this spec's type, then runs the filter.
    ///
    /// Only numeric strings and integers convert into each other; every other
    /// mismatch is rejected.
    pub fn resolve(&self, raw: &serde_json::Value) -> Result<Value, ConfigError> {
        let value = self.coerce(raw)?;
        match self.filter {
            Some(filter) => filter(self.key, value),
            None => Ok(value),
        }
    }

    fn coerce(&self, raw: &serde_json::Value) -> Result<Value, ConfigError> {
        use serde_json::Value as Raw;

        let coerced = match (self.kind, raw) {
            (SpecType::String, Raw::String(s)) => Some(Value::String(s.clone())),
            (SpecType::String, Raw::Number(n)) => n.as_i64().map(|i| Value::String(i.to_string())),
            (SpecType::Integer, Raw::Number(n)) => n.as_i64().map(Value::Integer),
            (SpecType::Integer, Raw::String(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (SpecType::Boolean, Raw::Bool(b)) => Some(Value::Boolean(*b)),
            _ => None,
        };

        coerced.ok_or_else(|| ConfigError::InvalidValue {
            key: self.key.to_string(),
            value: raw.to_string(),
        })
    }
}

impl fmt::Debug for ValueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSpec")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("serializable", &self.serializable)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}
