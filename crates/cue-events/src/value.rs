//! Script-facing values produced by wait primitives and forwarded to callbacks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A generic value as the script interpreter sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Integer(i64),
    Text(String),
    List(Vec<ScriptValue>),
}

impl ScriptValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScriptValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScriptValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ScriptValue]> {
        match self {
            ScriptValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl Default for ScriptValue {
    fn default() -> Self {
        ScriptValue::Integer(0)
    }
}

impl From<i64> for ScriptValue {
    fn from(n: i64) -> Self {
        ScriptValue::Integer(n)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::Text(s.to_owned())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::Text(s)
    }
}

impl<T: Into<ScriptValue>> From<Vec<T>> for ScriptValue {
    fn from(items: Vec<T>) -> Self {
        ScriptValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Integer(n) => write!(f, "{n}"),
            ScriptValue::Text(s) => f.write_str(s),
            ScriptValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A script value stamped with the creation time of the record it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedValue {
    pub value: ScriptValue,
    pub created_ms: u64,
}
