//! Replication (4.2.3): wraps a primary with a replica. `put` writes the
//! primary then the replica under a copy of `Object` retargeted to the
//! replica's client identity; `remove` deletes from both. `get`/`stat`/
//! `list` consult only the primary.
//!
//! Under Raft gating, `put` runs on the leader only when the primary's
//! medium is `Remote`; `Local` primaries write directly, matching the
//! spec's "a local primary doesn't need to agree with the cluster about
//! who may write it" rule.

use std::sync::Arc;

use async_trait::async_trait;
use pioneer_consensus::Distributed;
use pioneer_core::{PioneerError, PioneerResult, StorageClientKey, StorageKey, StoragePath};
use pioneer_storage::{FileData, Medium, Metadata, Object, StorageClient};
use tracing::warn;

pub struct ReplicationWrapper {
    primary: Arc<dyn StorageClient>,
    replica: Arc<dyn StorageClient>,
    leader_gate: Option<Distributed<()>>,
}

impl ReplicationWrapper {
    pub fn new(primary: Arc<dyn StorageClient>, replica: Arc<dyn StorageClient>) -> Arc<Self> {
        Arc::new(Self { primary, replica, leader_gate: None })
    }

    /// Gate `put` on this node being the Raft leader for the primary's
    /// replication group, used only when `primary.medium() == Medium::Remote`.
    pub fn with_leader_gate(primary: Arc<dyn StorageClient>, replica: Arc<dyn StorageClient>, gate: Distributed<()>) -> Arc<Self> {
        Arc::new(Self { primary, replica, leader_gate: Some(gate) })
    }

    async fn assert_may_write(&self) -> PioneerResult<()> {
        if self.primary.medium() != Medium::Remote {
            return Ok(());
        }
        if let Some(gate) = &self.leader_gate {
            if !gate.is_master().await {
                return Err(PioneerError::BackendError(anyhow::anyhow!(
                    "not leader for this replicated primary; route the write there instead"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for ReplicationWrapper {
    fn identity(&self) -> &StorageClientKey {
        self.primary.identity()
    }

    fn medium(&self) -> Medium {
        self.primary.medium()
    }

    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>> {
        self.primary.raw_get(path).await
    }

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()> {
        self.primary.raw_put(path, bytes).await
    }

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()> {
        self.primary.raw_remove(path).await
    }

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool> {
        self.primary.raw_exists(path).await
    }

    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>> {
        self.primary.child_directories(prefix).await
    }

    async fn get(&self, key: &StorageKey) -> PioneerResult<FileData> {
        self.primary.get(key).await
    }

    async fn put(&self, object: Object, data: FileData) -> PioneerResult<()> {
        self.assert_may_write().await?;
        self.primary.put(object.clone(), data.clone()).await?;
        let mut replica_object = object;
        replica_object.key = replica_object.key.retarget(self.replica.identity().clone());
        if let Err(e) = self.replica.put(replica_object, data).await {
            warn!(error = %e, "replication to replica failed; primary write kept");
        }
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        self.assert_may_write().await?;
        self.primary.remove(key).await?;
        let replica_key = key.retarget(self.replica.identity().clone());
        if let Err(e) = self.replica.remove(&replica_key).await {
            warn!(error = %e, "replica delete failed after primary delete");
        }
        Ok(())
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        self.primary.stat(key).await
    }

    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        self.primary.list(prefix, recursive).await
    }

    async fn update(&self, object: Object) -> PioneerResult<()> {
        self.primary.update(object.clone()).await?;
        let mut replica_object = object;
        replica_object.key = replica_object.key.retarget(self.replica.identity().clone());
        if let Err(e) = self.replica.update(replica_object).await {
            warn!(error = %e, "replica header update failed");
        }
        Ok(())
    }

    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        self.primary.change(key, metadata.clone()).await?;
        let replica_key = key.retarget(self.replica.identity().clone());
        if let Err(e) = self.replica.change(&replica_key, metadata).await {
            warn!(error = %e, "replica metadata change failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    #[tokio::test]
    async fn put_lands_on_both_primary_and_replica() {
        let primary: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let replica: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let wrapper = ReplicationWrapper::new(primary.clone(), replica.clone());

        let key = StorageKey::new(primary.identity().clone(), StoragePath::new("a.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hello".to_vec());
        wrapper.put(object, data.clone()).await.unwrap();

        assert_eq!(wrapper.get(&key).await.unwrap(), data);
        let replica_key = key.retarget(replica.identity().clone());
        assert_eq!(replica.get(&replica_key).await.unwrap(), data);
    }

    #[tokio::test]
    async fn remove_deletes_from_both() {
        let primary: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let replica: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let wrapper = ReplicationWrapper::new(primary.clone(), replica.clone());

        let key = StorageKey::new(primary.identity().clone(), StoragePath::new("a.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hello".to_vec());
        wrapper.put(object, data).await.unwrap();
        wrapper.remove(&key).await.unwrap();

        assert!(wrapper.get(&key).await.is_err());
        let replica_key = key.retarget(replica.identity().clone());
        assert!(replica.get(&replica_key).await.is_err());
    }
}
