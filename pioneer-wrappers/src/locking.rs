//! Locking (4.2.6): two concerns layered over one wrapper. A storage-wide
//! [`StorageLease`] protects the whole backend from concurrent cluster
//! writers (fatal, fail-closed if missing or expired), and a per-key
//! record lock from the distributed lock manager (C6.3) serializes
//! `get`/`put`/`remove` on a single object across nodes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pioneer_core::{PioneerError, PioneerResult, StorageClientKey, StorageKey, StoragePath};
use pioneer_distribution::{DistributedLockManager, StorageLease};
use pioneer_storage::{FileData, Medium, Metadata, Object, StorageClient};

pub struct LockingWrapper {
    inner: Arc<dyn StorageClient>,
    lease: Option<Arc<StorageLease>>,
    lock_manager: Arc<DistributedLockManager>,
}

impl LockingWrapper {
    /// Wrap `inner`, acquiring `lease` (if given) up front — construction
    /// fails with `LeaseInvalid` exactly as [`StorageLease::acquire`]
    /// does, so a caller racing another node to wrap the same storage
    /// either gets a working wrapper or a clear reason it didn't.
    pub fn new(inner: Arc<dyn StorageClient>, lease: Option<Arc<StorageLease>>, lock_manager: Arc<DistributedLockManager>) -> Arc<Self> {
        Arc::new(Self { inner, lease, lock_manager })
    }

    async fn assert_lease_valid(&self) -> PioneerResult<()> {
        match &self.lease {
            Some(lease) if !lease.is_valid().await => {
                Err(PioneerError::LeaseInvalid("storage lease expired or lost".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorageClient for LockingWrapper {
    fn identity(&self) -> &StorageClientKey {
        self.inner.identity()
    }

    fn medium(&self) -> Medium {
        self.inner.medium()
    }

    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>> {
        self.inner.raw_get(path).await
    }

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()> {
        self.inner.raw_put(path, bytes).await
    }

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()> {
        self.inner.raw_remove(path).await
    }

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool> {
        self.inner.raw_exists(path).await
    }

    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>> {
        self.inner.child_directories(prefix).await
    }

    async fn get(&self, key: &StorageKey) -> PioneerResult<FileData> {
        self.assert_lease_valid().await?;
        let _guard = self.lock_manager.try_acquire(&key.to_string()).await?;
        self.inner.get(key).await
    }

    async fn put(&self, object: Object, data: FileData) -> PioneerResult<()> {
        self.assert_lease_valid().await?;
        let _guard = self.lock_manager.try_acquire(&object.key.to_string()).await?;
        self.inner.put(object, data).await
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        self.assert_lease_valid().await?;
        let _guard = self.lock_manager.try_acquire(&key.to_string()).await?;
        self.inner.remove(key).await
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        self.assert_lease_valid().await?;
        self.inner.stat(key).await
    }

    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        self.assert_lease_valid().await?;
        self.inner.list(prefix, recursive).await
    }

    async fn update(&self, object: Object) -> PioneerResult<()> {
        self.assert_lease_valid().await?;
        let _guard = self.lock_manager.try_acquire(&object.key.to_string()).await?;
        self.inner.update(object).await
    }

    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        self.assert_lease_valid().await?;
        let _guard = self.lock_manager.try_acquire(&key.to_string()).await?;
        self.inner.change(key, metadata).await
    }
}

/// Default record-lock acquisition timeout used when a caller doesn't
/// need a tighter one, matching `LockingConfig::objects`'s duration in
/// `pioneer_core::config`.
pub fn default_record_lock_timeout() -> Duration {
    Duration::from_secs(30)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    async fn lock_manager() -> Arc<DistributedLockManager> {
        DistributedLockManager::new("node-a".to_string(), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn put_then_get_round_trips_without_a_lease() {
        let inner = MemoryClient::new().await.unwrap();
        let wrapper = LockingWrapper::new(inner, None, lock_manager().await);
        let key = StorageKey::new(wrapper.identity().clone(), StoragePath::new("a.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hi".to_vec());
        wrapper.put(object, data.clone()).await.unwrap();
        assert_eq!(wrapper.get(&key).await.unwrap(), data);
    }

    #[tokio::test]
    async fn expired_lease_fails_every_op_closed() {
        let inner: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let lease = StorageLease::acquire(inner.clone(), "cluster-a", Duration::from_millis(20), Duration::from_millis(5))
            .await
            .unwrap();
        let wrapper = LockingWrapper::new(inner, Some(lease), lock_manager().await);
        tokio::time::sleep(Duration::from_millis(40)).await;

        let key = StorageKey::new(wrapper.identity().clone(), StoragePath::new("a.txt").unwrap());
        assert!(matches!(wrapper.get(&key).await, Err(PioneerError::LeaseInvalid(_))));
    }
}
