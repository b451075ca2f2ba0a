//! [`Value`]: the tagged-union value tree backing [`crate::Data`]. An
//! open-schema bag of fields expressed as a strongly-typed scalar/list/set/map
//! tree instead of relying on runtime duck typing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A JSON-compatible value that additionally distinguishes an unordered,
/// deduplicated `Set` from an ordered `List`.
///
/// `Set` members must support equality; we keep them as a `Vec` with
/// insertion-time deduplication by serialized form rather than requiring
/// `Value: Hash` (not meaningful for floating-point numbers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_))
    }

    /// Insert into a `Set`, deduplicating by serialized representation.
    pub fn set_insert(set: &mut Vec<Value>, item: Value) {
        let repr = serde_json::to_string(&item).unwrap_or_default();
        if !set.iter().any(|v| serde_json::to_string(v).unwrap_or_default() == repr) {
            set.push(item);
        }
    }

    pub fn from_json(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(l) | Value::Set(l) => {
                serde_json::Value::Array(l.iter().map(Value::to_json).collect())
            }
            Value::Map(m) => {
                serde_json::Value::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({"a": 1, "b": [1, 2, "x"], "c": null});
        let value = Value::from_json(json.clone());
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn set_insert_dedups() {
        let mut set = Vec::new();
        Value::set_insert(&mut set, Value::from(1i64));
        Value::set_insert(&mut set, Value::from(1i64));
        Value::set_insert(&mut set, Value::from(2i64));
        assert_eq!(set.len(), 2);
    }
}
