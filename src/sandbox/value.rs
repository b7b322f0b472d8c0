//! Value bridge between host data and the script interpreter.
//!
//! Host code only ever sees [`Value`]; Rhai code only ever sees [`Dynamic`].
//! [`to_host`] and [`from_host`] are the single crossing points and carry no
//! side effects.

use indexmap::IndexMap;
use rhai::{Array, Dynamic, Map};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-side script value.
///
/// `Map` keeps insertion order. Values coming back from the interpreter have
/// their keys in sorted order because Rhai object maps are ordered by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type label used in formatting diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Render as plain text: strings verbatim, null as empty, everything else as JSON.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Self::Map(value)
    }
}

/// Convert an interpreter value into a host value.
///
/// Types outside the bridge (function pointers, timestamps, custom types)
/// degrade to their string rendering. Blobs become lists of byte values.
pub fn to_host(value: Dynamic) -> Value {
    let value = value.flatten();

    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return Value::Int(i);
    }
    if let Ok(x) = value.as_float() {
        return Value::Float(x);
    }
    if let Ok(c) = value.as_char() {
        return Value::String(c.to_string());
    }
    if value.is_string() {
        return match value.into_string() {
            Ok(s) => Value::String(s),
            Err(type_name) => Value::String(format!("<{type_name}>")),
        };
    }
    if value.is_array() {
        return match value.into_array() {
            Ok(items) => Value::List(items.into_iter().map(to_host).collect()),
            Err(type_name) => Value::String(format!("<{type_name}>")),
        };
    }
    if value.is_blob() {
        return match value.into_blob() {
            Ok(bytes) => Value::List(bytes.into_iter().map(|b| Value::Int(i64::from(b))).collect()),
            Err(type_name) => Value::String(format!("<{type_name}>")),
        };
    }
    if value.is_map() {
        return match value.try_cast::<Map>() {
            Some(map) => Value::Map(
                map.into_iter()
                    .map(|(key, item)| (key.to_string(), to_host(item)))
                    .collect(),
            ),
            None => Value::String("<map>".to_string()),
        };
    }

    Value::String(value.to_string())
}

/// Convert a host value into an interpreter value.
pub fn from_host(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Int(i) => Dynamic::from_int(*i),
        Value::Float(x) => Dynamic::from_float(*x),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::List(items) => {
            let array: Array = items.iter().map(from_host).collect();
            Dynamic::from_array(array)
        }
        Value::Map(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                map.insert(key.as_str().into(), from_host(item));
            }
            Dynamic::from_map(map)
        }
    }
}
