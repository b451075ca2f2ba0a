//! [`PioneerNode`]: construction and lifecycle only — no business logic.
//! Builds the configured storage endpoints, joins the cluster via mDNS
//! peer discovery, and acquires the storage-wide lease on the primary
//! endpoint. Everything else (databases, repositories, wrapper stacks)
//! is built by callers on top of the storage clients this exposes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pioneer_core::{PioneerConfig, StorageEndpointConfig};
use pioneer_distribution::{PeerDiscovery, StorageLease};
use pioneer_storage::{build_backend, BackendKind, StorageClient};
use tracing::{debug, info};

const PRIMARY_ENDPOINT: &str = "primary";

fn backend_kind(endpoint: &StorageEndpointConfig) -> BackendKind {
    if let Some(bucket) = endpoint.repository.strip_prefix("s3://") {
        return BackendKind::S3 {
            bucket: bucket.to_string(),
            endpoint: endpoint.endpoint.clone(),
            region: endpoint.region.clone(),
            access_key: endpoint.access_key.clone(),
            secret_key: endpoint.secret_key.clone(),
        };
    }
    if let Some(path) = endpoint.repository.strip_prefix("local://") {
        return BackendKind::Local(PathBuf::from(path));
    }
    if endpoint.repository == "memory" {
        return BackendKind::Memory;
    }
    BackendKind::Local(PathBuf::from(&endpoint.repository))
}

/// A running Pioneer node: its configuration, every named storage client
/// it was configured with, and the cluster-facing handles (peer
/// discovery, storage lease) acquired on `start`.
pub struct PioneerNode {
    config: PioneerConfig,
    storages: HashMap<String, Arc<dyn StorageClient>>,
    discovery: Option<Arc<PeerDiscovery>>,
    lease: Option<Arc<StorageLease>>,
}

impl PioneerNode {
    /// Load configuration and construct every configured storage
    /// endpoint. Falls back to a single in-memory `primary` endpoint if
    /// none are configured, so a node can start against no config file
    /// at all.
    pub async fn new() -> Result<Self> {
        let config = PioneerConfig::load().await?;

        let mut storages = HashMap::new();
        for (name, endpoint) in &config.storage {
            debug!(name, repository = %endpoint.repository, "building storage endpoint");
            let backend = build_backend(backend_kind(endpoint)).await?;
            storages.insert(name.clone(), backend);
        }
        if storages.is_empty() {
            debug!("no storage endpoints configured, defaulting to an in-memory primary");
            storages.insert(PRIMARY_ENDPOINT.to_string(), build_backend(BackendKind::Memory).await?);
        }

        Ok(Self { config, storages, discovery: None, lease: None })
    }

    pub fn config(&self) -> &PioneerConfig {
        &self.config
    }

    pub fn storage(&self, name: &str) -> Option<Arc<dyn StorageClient>> {
        self.storages.get(name).cloned()
    }

    pub fn peers(&self) -> Option<Arc<PeerDiscovery>> {
        self.discovery.clone()
    }

    /// Joins the cluster: starts mDNS peer discovery and acquires the
    /// storage-wide lease on the `primary` endpoint, if one exists.
    pub async fn start(&mut self) -> Result<()> {
        info!(cluster = %self.config.cluster.name, peers = self.storages.len(), "starting pioneer node");

        self.discovery = Some(PeerDiscovery::start()?);

        if let Some(primary) = self.storage(PRIMARY_ENDPOINT) {
            let timing = &self.config.locking.storage;
            let lease = StorageLease::acquire(
                primary,
                self.config.cluster.name.clone(),
                timing.duration(),
                Duration::from_secs(timing.grace_secs),
            )
            .await?;
            self.lease = Some(lease);
        }

        Ok(())
    }

    /// Releases the storage lease. Peer discovery has no explicit
    /// shutdown; its background task is dropped with the handle.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(lease) = self.lease.take() {
            lease.release().await;
        }
        self.discovery = None;
        info!("pioneer node stopped");
        Ok(())
    }
}
