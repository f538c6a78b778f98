//! The decoded status document.
//!
//! A status API answers with one nested JSON object per poll. Its top-level
//! keys name the resources the server exposes (`angie`, `connections`,
//! `http`, `stream`, `slabs`, `resolvers`, ...), which is also how the
//! dashboard learns which sections exist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConsoleError, Result};

/// One poll's worth of status data, keyed by top-level resource name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSnapshot(BTreeMap<String, Value>);

impl StatusSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a snapshot from a JSON string.
    ///
    /// The top level must be an object; anything else is a parse error.
    pub fn parse(content: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(content)?)
    }

    /// Decode a snapshot from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Decode a snapshot from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(ConsoleError::Parse(format!(
                "expected a JSON object at the top level, found {}",
                kind(&other)
            ))),
        }
    }

    /// Look up a resource by path, e.g. `["http", "server_zones"]`.
    pub fn resource(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.get(*key)?;
        }
        Some(current)
    }

    /// Top-level value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Top-level resource names, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Insert or replace a top-level resource.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Check if the snapshot is empty (no resources).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of top-level resources.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
