//! Per-field merge strategy, attached to a [`Schema`] the way JSON Schema
//! attaches `"mergeStrategy"` to a `properties` entry, simplified to just the
//! strategy tree — this crate does not reconstruct full JSON Schema type
//! descriptions, only the merge-relevant annotations (see DESIGN.md).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How two values at the same field path combine during a structural merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    Overwrite,
    Discard,
    Append,
    ArrayMergeById,
    ArrayMergeByIndex,
    ObjectMerge,
    Version,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Overwrite
    }
}

/// Per-field-path merge strategy annotations, keyed by [`crate::FieldPath::repr`].
///
/// Lookup falls back to [`MergeStrategy::Overwrite`] for any path with no
/// explicit entry, matching `custom_json_schema`'s default-fill behavior in
/// the original model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub strategies: HashMap<String, MergeStrategy>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, path_repr: impl Into<String>, strategy: MergeStrategy) -> Self {
        self.strategies.insert(path_repr.into(), strategy);
        self
    }

    pub fn strategy_for(&self, path_repr: &str) -> MergeStrategy {
        self.strategies.get(path_repr).copied().unwrap_or_default()
    }

    /// Merge `self` over `base`, with `self`'s entries taking precedence.
    pub fn overlay(&self, base: &Schema) -> Schema {
        let mut merged = base.strategies.clone();
        merged.extend(self.strategies.clone());
        Schema { strategies: merged }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_field_defaults_to_overwrite() {
        let schema = Schema::new();
        assert_eq!(schema.strategy_for("a.b"), MergeStrategy::Overwrite);
    }

    #[test]
    fn overlay_prefers_self() {
        let base = Schema::new().with_strategy("a", MergeStrategy::Discard);
        let overlay = Schema::new().with_strategy("a", MergeStrategy::Append);
        let merged = overlay.overlay(&base);
        assert_eq!(merged.strategy_for("a"), MergeStrategy::Append);
    }
}
