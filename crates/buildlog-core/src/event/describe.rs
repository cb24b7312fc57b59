//! Key-value snapshots of event payloads.
//!
//! The global event log renders every event as `Kind: {field: value, ...}`.
//! Instead of inspecting payloads reflectively, each event type lists its own
//! fields through [`Describe`]. Field order is the declaration order of the
//! payload, so the rendering is deterministic across runs.

use std::fmt;

use serde_json::Value;

use crate::error::Result;

/// A rendered field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
    Map(Vec<(String, FieldValue)>),
}

/// One `name: value` pair of a snapshot.
pub type Field = (String, FieldValue);

/// Events that can list their own fields.
pub trait Describe {
    /// Name used for the event in the global log, e.g. `JobEnded`.
    fn kind_name(&self) -> &str;

    /// Ordered field snapshot.
    fn describe(&self) -> Result<Vec<Field>>;
}

/// Shorthand for building a field list.
pub(crate) fn field(name: &str, value: impl Into<FieldValue>) -> Field {
    (name.to_string(), value.into())
}

/// Render a snapshot as `{name: value, ...}`.
pub fn render_fields(fields: &[Field]) -> String {
    FieldValue::Map(fields.to_vec()).to_string()
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("None"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::Bytes(bytes) => write!(f, "b\"{}\"", bytes.escape_ascii()),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            FieldValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (name, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Text(value.clone())
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Bytes(value.to_vec())
    }
}

impl From<&[String]> for FieldValue {
    fn from(value: &[String]) -> Self {
        FieldValue::List(value.iter().map(FieldValue::from).collect())
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => FieldValue::List(items.iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}
