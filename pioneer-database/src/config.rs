//! `DatabaseConfig`: the per-database metadata persisted alongside the
//! record bodies as `._database.json`.
//!
//! `operations` is carried as inert configuration data — a per-field-path
//! computed/derived-value hook table — rather than an execution engine,
//! since general-purpose compute scheduling is an explicit non-goal. The
//! shape survives round-trips so a future executor could consume it
//! without a storage format change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named, uninterpreted computed-field hook. `params` is whatever
/// arguments the (unimplemented) executor would need; this crate only
/// stores and round-trips it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `FieldPath::repr() -> FunctionConfig`.
    #[serde(default)]
    pub operations: HashMap<String, FunctionConfig>,
}

pub const DATABASE_CONFIG_FILE: &str = "._database.json";
