//! [`FieldPath`]: a sequence of string keys identifying a nested field
//! within a [`crate::Data`] record. List indices are represented as their
//! stringified form, exactly as `flatten` produces them.

use serde::{Deserialize, Serialize};

pub type FieldKey = String;

/// A path to a nested field. Constructed either from literal segments
/// (`FieldPath::from(["a", "b"])`) or parsed from its `repr` form
/// (`"a.b.0"`) as used for index database keys (C8.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct FieldPath(pub Vec<FieldKey>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn push(&self, key: impl Into<FieldKey>) -> Self {
        let mut parts = self.0.clone();
        parts.push(key.into());
        Self(parts)
    }

    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        other.0.len() >= self.0.len() && self.0 == other.0[..self.0.len()]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical dot-joined representation, used as the index database's key.
    pub fn repr(&self) -> String {
        self.0.join(".")
    }

    pub fn parse(repr: &str) -> Self {
        if repr.is_empty() {
            return Self::root();
        }
        Self(repr.split('.').map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(parts: [&str; N]) -> Self {
        Self(parts.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for FieldPath {
    fn from(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_round_trip() {
        let p = FieldPath::from(["a", "b", "0"]);
        assert_eq!(FieldPath::parse(&p.repr()), p);
    }

    #[test]
    fn prefix_check() {
        let a = FieldPath::from(["a"]);
        let ab = FieldPath::from(["a", "b"]);
        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
    }
}
