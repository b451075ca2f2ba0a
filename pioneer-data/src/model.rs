//! [`Data`]: the open-schema, mergeable, flattenable record. All top-level
//! keys are strings; nested objects are represented structurally by
//! [`Value::Map`] rather than by a distinct "nested Data" type, since the
//! two are identical once flattened.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::FieldPath;
use crate::schema::{MergeStrategy, Schema};
use crate::value::Value;

/// An open-schema structured record. See module docs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Data {
    pub fields: BTreeMap<String, Value>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: serde_json::Value) -> anyhow::Result<Self> {
        match Value::from_json(value) {
            Value::Map(fields) => Ok(Self { fields }),
            other => anyhow::bail!("Data must be constructed from a JSON object, got {other:?}"),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Map(self.fields.clone()).to_json()
    }

    /// Look up the value at a dotted field path, descending through maps
    /// and, for numeric segments, list indices.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let root = self.fields.get(&path.0[0])?;
        get_in(root, &path.0[1..])
    }

    /// Insert or overwrite the value at `path`, creating intermediate maps
    /// as needed.
    pub fn set(&mut self, path: &FieldPath, value: Value) {
        if path.is_empty() {
            return;
        }
        if path.len() == 1 {
            self.fields.insert(path.0[0].clone(), value);
            return;
        }
        let entry = self
            .fields
            .entry(path.0[0].clone())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        set_in(entry, &path.0[1..], value);
    }

    /// Overlay every flattened `(path, value)` pair of `other` onto `self`.
    pub fn update(&mut self, other: &Data) {
        for (path, value) in other.flattened() {
            self.set(&path, value);
        }
    }

    /// Flatten into `(FieldPath, Value)` pairs. `Set` values and scalars
    /// are leaves; `Map` and `List` recurse. Empty maps/lists produce no
    /// leaves, so an empty container field does not survive a
    /// flatten/inflate round trip.
    pub fn flattened(&self) -> Vec<(FieldPath, Value)> {
        let mut out = Vec::new();
        for (key, value) in &self.fields {
            flatten_into(&FieldPath::from([key.as_str()]), value, &mut out);
        }
        out
    }

    /// Reconstruct a `Data` from a flattened pair list. `inflate(flatten(x))
    /// == x` for any `x` without empty-container fields.
    pub fn inflate(flat: &[(FieldPath, Value)]) -> Self {
        let mut fields: BTreeMap<String, Value> = BTreeMap::new();
        let mut ordered: Vec<&(FieldPath, Value)> = flat.iter().collect();
        ordered.sort_by_key(|(p, _)| p.len());
        for (path, value) in ordered {
            if path.is_empty() {
                continue;
            }
            if path.len() == 1 {
                fields.insert(path.0[0].clone(), value.clone());
                continue;
            }
            let entry = fields
                .entry(path.0[0].clone())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            set_in(entry, &path.0[1..], value.clone());
        }
        let mut data = Self { fields };
        data.listify();
        data
    }

    /// Convert any `Map` whose keys are exactly `"0".."n-1"` back into a
    /// `List`, undoing the stringified-index encoding `flattened` applies.
    fn listify(&mut self) {
        for value in self.fields.values_mut() {
            listify_value(value);
        }
    }

    /// Structural, schema-driven merge of two records.
    ///
    /// Returns the effective schema (the passed-in schema, defaulting any
    /// field it doesn't mention to [`MergeStrategy::Overwrite`]) and the
    /// merged record. See DESIGN.md for why this does not reconstruct full
    /// JSON-Schema type descriptions.
    pub fn merge(old: &Data, new: &Data, schema: Option<&Schema>) -> (Schema, Data) {
        let effective_schema = schema.cloned().unwrap_or_default();
        let mut merged_fields = BTreeMap::new();

        let mut keys: Vec<&String> = old.fields.keys().chain(new.fields.keys()).collect();
        keys.sort();
        keys.dedup();

        for key in keys {
            let path = FieldPath::from([key.as_str()]);
            let strategy = effective_schema.strategy_for(&path.repr());
            let merged = merge_value(
                old.fields.get(key),
                new.fields.get(key),
                &effective_schema,
                &path,
                strategy,
            );
            merged_fields.insert(key.clone(), merged);
        }

        (effective_schema, Data { fields: merged_fields })
    }
}

fn get_in<'a>(root: &'a Value, rest: &[String]) -> Option<&'a Value> {
    if rest.is_empty() {
        return Some(root);
    }
    match root {
        Value::Map(m) => m.get(&rest[0]).and_then(|v| get_in(v, &rest[1..])),
        Value::List(l) => rest[0].parse::<usize>().ok().and_then(|i| l.get(i)).and_then(|v| get_in(v, &rest[1..])),
        _ => None,
    }
}

fn set_in(root: &mut Value, rest: &[String], value: Value) {
    if rest.is_empty() {
        *root = value;
        return;
    }
    if !matches!(root, Value::Map(_)) {
        *root = Value::Map(BTreeMap::new());
    }
    if let Value::Map(m) = root {
        if rest.len() == 1 {
            m.insert(rest[0].clone(), value);
        } else {
            let entry = m.entry(rest[0].clone()).or_insert_with(|| Value::Map(BTreeMap::new()));
            set_in(entry, &rest[1..], value);
        }
    }
}

fn flatten_into(path: &FieldPath, value: &Value, out: &mut Vec<(FieldPath, Value)>) {
    match value {
        Value::Map(m) => {
            for (k, v) in m {
                flatten_into(&path.push(k.as_str()), v, out);
            }
        }
        Value::List(l) => {
            for (i, v) in l.iter().enumerate() {
                flatten_into(&path.push(i.to_string()), v, out);
            }
        }
        _ => out.push((path.clone(), value.clone())),
    }
}

fn listify_value(value: &mut Value) {
    match value {
        Value::Map(m) => {
            for v in m.values_mut() {
                listify_value(v);
            }
            if is_index_map(m) {
                let mut items: Vec<(usize, Value)> = m
                    .iter()
                    .map(|(k, v)| (k.parse::<usize>().expect("checked by is_index_map"), v.clone()))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                *value = Value::List(items.into_iter().map(|(_, v)| v).collect());
            }
        }
        Value::List(l) => {
            for v in l.iter_mut() {
                listify_value(v);
            }
        }
        _ => {}
    }
}

fn is_index_map(m: &BTreeMap<String, Value>) -> bool {
    !m.is_empty() && (0..m.len()).all(|i| m.contains_key(&i.to_string()))
}

fn merge_value(
    old: Option<&Value>,
    new: Option<&Value>,
    schema: &Schema,
    path: &FieldPath,
    strategy: MergeStrategy,
) -> Value {
    match (old, new) {
        (None, Some(n)) => n.clone(),
        (Some(o), None) => o.clone(),
        (None, None) => Value::Null,
        (Some(o), Some(n)) => match strategy {
            MergeStrategy::Overwrite => n.clone(),
            MergeStrategy::Discard => o.clone(),
            MergeStrategy::Append => match (o, n) {
                (Value::List(a), Value::List(b)) => {
                    let mut v = a.clone();
                    v.extend(b.clone());
                    Value::List(v)
                }
                _ => n.clone(),
            },
            MergeStrategy::ArrayMergeByIndex => match (o, n) {
                (Value::List(a), Value::List(b)) => {
                    let len = a.len().max(b.len());
                    let mut out = Vec::with_capacity(len);
                    for i in 0..len {
                        out.push(b.get(i).or_else(|| a.get(i)).cloned().unwrap_or(Value::Null));
                    }
                    Value::List(out)
                }
                _ => n.clone(),
            },
            MergeStrategy::ArrayMergeById => match (o, n) {
                (Value::List(a), Value::List(b)) => merge_lists_by_id(a, b),
                _ => n.clone(),
            },
            MergeStrategy::ObjectMerge => match (o, n) {
                (Value::Map(om), Value::Map(nm)) => {
                    let mut keys: Vec<&String> = om.keys().chain(nm.keys()).collect();
                    keys.sort();
                    keys.dedup();
                    let mut merged = BTreeMap::new();
                    for key in keys {
                        let child_path = path.push(key.as_str());
                        let child_strategy = schema.strategy_for(&child_path.repr());
                        merged.insert(
                            key.clone(),
                            merge_value(om.get(key), nm.get(key), schema, &child_path, child_strategy),
                        );
                    }
                    Value::Map(merged)
                }
                _ => n.clone(),
            },
            MergeStrategy::Version => version_wrap(o, n),
        },
    }
}

fn merge_lists_by_id(old: &[Value], new: &[Value]) -> Value {
    let id_of = |v: &Value| v.as_map().and_then(|m| m.get("id")).cloned();
    let mut result = Vec::new();
    for item in old {
        let id = id_of(item);
        match id.as_ref().and_then(|id| new.iter().find(|n| id_of(n).as_ref() == Some(id))) {
            Some(replacement) => result.push(replacement.clone()),
            None => result.push(item.clone()),
        }
    }
    for item in new {
        let id = id_of(item);
        let matched_old = id.is_some() && old.iter().any(|o| id_of(o) == id);
        if !matched_old {
            result.push(item.clone());
        }
    }
    Value::List(result)
}

fn version_wrap(old: &Value, new: &Value) -> Value {
    let next_version = old
        .as_map()
        .and_then(|m| m.get("version"))
        .and_then(|v| if let Value::Number(n) = v { n.as_i64() } else { None })
        .map(|v| v + 1)
        .unwrap_or(1);
    let mut m = BTreeMap::new();
    m.insert("value".to_string(), new.clone());
    m.insert("version".to_string(), Value::from(next_version));
    Value::Map(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(json: serde_json::Value) -> Data {
        Data::from_json(json).unwrap()
    }

    #[test]
    fn flatten_inflate_round_trip() {
        let d = data(serde_json::json!({"a": 1, "b": [{"c": 2}, {"c": 3}]}));
        let flat = d.flattened();
        assert_eq!(Data::inflate(&flat), d);
    }

    #[test]
    fn merge_idempotent() {
        let d = data(serde_json::json!({"a": 1, "b": {"c": 2}}));
        let (_, merged) = Data::merge(&d, &d, None);
        assert_eq!(merged, d);
    }

    #[test]
    fn merge_associative_disjoint_keys() {
        let a = data(serde_json::json!({"a": 1}));
        let b = data(serde_json::json!({"b": 2}));
        let c = data(serde_json::json!({"c": 3}));

        let (_, ab) = Data::merge(&a, &b, None);
        let (_, ab_c) = Data::merge(&ab, &c, None);

        let (_, bc) = Data::merge(&b, &c, None);
        let (_, a_bc) = Data::merge(&a, &bc, None);

        assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn merge_overwrite_semantics() {
        let old = data(serde_json::json!({"a": 1, "b": 2}));
        let new = data(serde_json::json!({"a": 3, "c": 4}));
        let (_, merged) = Data::merge(&old, &new, None);
        assert_eq!(merged, data(serde_json::json!({"a": 3, "b": 2, "c": 4})));
    }

    #[test]
    fn update_overlays_every_flattened_path() {
        let mut base = data(serde_json::json!({"a": 1, "b": {"c": 2}}));
        let overlay = data(serde_json::json!({"b": {"c": 9, "d": 10}}));
        base.update(&overlay);
        for (path, value) in overlay.flattened() {
            assert_eq!(base.get(&path), Some(&value));
        }
    }

    #[test]
    fn field_path_get_into_list() {
        let d = data(serde_json::json!({"a": [10, 20, 30]}));
        let path = FieldPath::from(["a", "1"]);
        assert_eq!(d.get(&path), Some(&Value::from(20i64)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z]{1,8}".prop_map(Value::from),
        ]
    }

    /// Recursive, non-empty maps/lists only — flatten/inflate does not
    /// round-trip an empty container field (see `flattened`'s docs).
    fn any_value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(Value::List),
                prop::collection::btree_map("[a-z]{1,6}", inner, 1..4).prop_map(Value::Map),
            ]
        })
    }

    fn any_data() -> impl Strategy<Value = Data> {
        prop::collection::btree_map("[a-z]{1,6}", any_value(), 1..6).prop_map(|fields| Data { fields })
    }

    proptest! {
        #[test]
        fn flatten_inflate_round_trips(d in any_data()) {
            let flat = d.flattened();
            prop_assert_eq!(Data::inflate(&flat), d);
        }

        #[test]
        fn overwrite_merge_always_prefers_new_scalar_leaves(a in any_data(), b in any_data()) {
            let (_, merged) = Data::merge(&a, &b, None);
            for (key, value) in &b.fields {
                if !value.is_container() {
                    prop_assert_eq!(merged.fields.get(key), Some(value));
                }
            }
        }

        #[test]
        fn merge_is_idempotent(d in any_data()) {
            let (_, merged) = Data::merge(&d, &d, None);
            prop_assert_eq!(merged, d);
        }
    }
}
