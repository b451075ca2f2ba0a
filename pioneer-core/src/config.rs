//! Configuration loading.
//!
//! A single JSON document, loaded from the path named by
//! `PIONEER_CONFIG_PATH` (default `.pioneer.json`): one struct per
//! subsystem, each with a `Default` impl, composed into a single root.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_PATH_ENV_VAR: &str = "PIONEER_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = ".pioneer.json";

/// Root configuration object. Every field has a working default so a node
/// can start with no config file present at all.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PioneerConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Named storage endpoints, keyed by the name a client refers to them
    /// by (e.g. `"primary"`, `"archive"`).
    #[serde(default)]
    pub storage: std::collections::HashMap<String, StorageEndpointConfig>,
    #[serde(default)]
    pub locking: LockingConfig,
    #[serde(default)]
    pub serialization: SerializationConfig,
}

impl PioneerConfig {
    /// Load from `PIONEER_CONFIG_PATH` (default `.pioneer.json`), falling
    /// back to [`Default::default`] if the file does not exist.
    pub async fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: PioneerConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    fn config_path() -> PathBuf {
        env::var(CONFIG_PATH_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

/// Cluster identity and peer-discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub port: u16,
    pub fqdn_service: String,
    pub version: String,
    #[serde(default)]
    pub initial_peers: Vec<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            port: 4310,
            fqdn_service: "_pioneer._tcp.local.".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            initial_peers: Vec::new(),
            user: None,
            group: None,
        }
    }
}

/// Connection settings for one named storage endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEndpointConfig {
    pub endpoint: Option<String>,
    pub repository: String,
    pub region: Option<String>,
    #[serde(default)]
    pub secure: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Lease/lock timing for both record-level and storage-wide locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockingConfig {
    pub objects: LeaseTiming,
    pub storage: LeaseTiming,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            objects: LeaseTiming { duration_secs: 30, grace_secs: 5 },
            storage: LeaseTiming { duration_secs: 60, grace_secs: 10 },
        }
    }
}

/// `duration` is how long a lease/lock is valid once acquired; `grace` is
/// how much earlier than expiry the holder refreshes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseTiming {
    pub duration_secs: u64,
    pub grace_secs: u64,
}

impl LeaseTiming {
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.duration_secs)
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.duration_secs.saturating_sub(self.grace_secs).max(1))
    }
}

/// Wire encoding for persisted records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializationConfig {
    pub encoding: Encoding,
    pub formatting: FormattingConfig,
    /// Fallback encoding tried when the primary encoding fails, e.g. when a
    /// `Data` value holds a non-UTF-8 byte string.
    #[serde(default)]
    pub fallback: Option<Encoding>,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Json,
            formatting: FormattingConfig::default(),
            fallback: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FormattingConfig {
    pub json: JsonFormatting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFormatting {
    pub indent: Option<usize>,
    pub sort_keys: bool,
}

impl Default for JsonFormatting {
    fn default() -> Self {
        Self { indent: None, sort_keys: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_lease_refresh() {
        let cfg = LockingConfig::default();
        assert!(cfg.storage.refresh_interval() < cfg.storage.duration());
    }

    #[tokio::test]
    async fn load_missing_file_falls_back_to_default() {
        let path = PathBuf::from("/nonexistent/pioneer-config-test.json");
        let cfg = PioneerConfig::load_from(&path).await;
        assert!(cfg.is_err());
    }
}
