//! # Condition Fragments
//!
//! WHERE-clause building blocks carried by a criteria set. Equality
//! conditions keep enough structure to merge per field and to preset
//! attributes on built records; everything else is an opaque fragment that
//! the executor receives untouched.

use serde::Serialize;
use serde_json::Value;

/// A single predicate carried by a criteria set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// Equality on a named field. On merge, a later value for the same field
    /// replaces the earlier one while keeping its position.
    Eq { field: String, value: Value },
    /// Opaque predicate text. Never re-parsed; merged by concatenation.
    Fragment { text: String },
}

impl Condition {
    /// Create an equality condition
    pub fn eq(field: &str, value: Value) -> Self {
        Self::Eq {
            field: field.to_string(),
            value,
        }
    }

    /// Create an opaque pass-through fragment
    pub fn fragment(text: &str) -> Self {
        Self::Fragment {
            text: text.to_string(),
        }
    }

    /// Field name for equality conditions; fragments have none
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Eq { field, .. } => Some(field),
            Self::Fragment { .. } => None,
        }
    }

    /// Value for equality conditions
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Eq { value, .. } => Some(value),
            Self::Fragment { .. } => None,
        }
    }

    /// Render as predicate text, for executors that compile to text clauses
    pub fn to_fragment(&self) -> String {
        match self {
            Self::Eq { field, value } => format!("{} = {}", field, format_value(value)),
            Self::Fragment { text } => text.clone(),
        }
    }
}

/// Format a JSON value for a text clause
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        _ => format!("'{}'", value.to_string().replace('\'', "''")),
    }
}
