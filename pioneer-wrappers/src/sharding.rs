//! Sharding (4.2.4): two-backend placement. A key's home shard is encoded
//! in `key.storage`; every operation is dispatched by matching it against
//! one of the wrapper's two backends. A key whose `storage` matches
//! neither fails with `WrongShard`.
//!
//! Placement strategy only decides which shard a *new* key is minted on —
//! see [`ShardingWrapper::place`]. Once a key exists it is addressed by
//! its own `storage` tag exactly like any other key, so `get`/`put`/
//! `remove`/`stat` on an existing key never re-run placement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pioneer_core::{PioneerError, PioneerResult, StorageClientKey, StorageKey, StoragePath};
use pioneer_storage::{FileData, Medium, Metadata, Object, StorageClient};

/// Placement strategy applied by [`ShardingWrapper::place`] when minting a
/// key for a new object. `MostFree`/`LeastFree` approximate "free space"
/// by entry count, since this crate has no storage-capacity telemetry to
/// consult (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardPlacement {
    RoundRobin,
    MostFree,
    LeastFree,
}

pub struct ShardingWrapper {
    shard_a: Arc<dyn StorageClient>,
    shard_b: Arc<dyn StorageClient>,
    strategy: ShardPlacement,
    round_robin_counter: AtomicU64,
}

impl ShardingWrapper {
    pub fn new(shard_a: Arc<dyn StorageClient>, shard_b: Arc<dyn StorageClient>, strategy: ShardPlacement) -> Arc<Self> {
        Arc::new(Self { shard_a, shard_b, strategy, round_robin_counter: AtomicU64::new(0) })
    }

    fn resolve(&self, key: &StorageKey) -> PioneerResult<&Arc<dyn StorageClient>> {
        if key.storage == *self.shard_a.identity() {
            Ok(&self.shard_a)
        } else if key.storage == *self.shard_b.identity() {
            Ok(&self.shard_b)
        } else {
            Err(PioneerError::WrongShard {
                key: key.to_string(),
                shard: format!("{}|{}", self.shard_a.identity(), self.shard_b.identity()),
            })
        }
    }

    async fn entry_count(backend: &Arc<dyn StorageClient>) -> usize {
        let root = StorageKey::new(backend.identity().clone(), StoragePath::root());
        backend.list(&root, true).await.map(|v| v.len()).unwrap_or(0)
    }

    /// Mint a [`StorageKey`] for a new object at `path`, choosing the
    /// shard per [`ShardPlacement`]. Once minted, the key's `storage`
    /// field is the chosen shard's identity, and ordinary dispatch takes
    /// over for every subsequent operation on it.
    pub async fn place(&self, path: StoragePath) -> StorageKey {
        let chosen = match self.strategy {
            ShardPlacement::RoundRobin => {
                if self.round_robin_counter.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
                    &self.shard_a
                } else {
                    &self.shard_b
                }
            }
            ShardPlacement::MostFree => {
                if Self::entry_count(&self.shard_a).await <= Self::entry_count(&self.shard_b).await {
                    &self.shard_a
                } else {
                    &self.shard_b
                }
            }
            ShardPlacement::LeastFree => {
                if Self::entry_count(&self.shard_a).await >= Self::entry_count(&self.shard_b).await {
                    &self.shard_a
                } else {
                    &self.shard_b
                }
            }
        };
        StorageKey::new(chosen.identity().clone(), path)
    }
}

#[async_trait]
impl StorageClient for ShardingWrapper {
    fn identity(&self) -> &StorageClientKey {
        self.shard_a.identity()
    }

    fn medium(&self) -> Medium {
        self.shard_a.medium()
    }

    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>> {
        self.shard_a.raw_get(path).await
    }

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()> {
        self.shard_a.raw_put(path, bytes).await
    }

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()> {
        self.shard_a.raw_remove(path).await
    }

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool> {
        self.shard_a.raw_exists(path).await
    }

    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>> {
        self.shard_a.child_directories(prefix).await
    }

    async fn get(&self, key: &StorageKey) -> PioneerResult<FileData> {
        self.resolve(key)?.get(key).await
    }

    async fn put(&self, object: Object, data: FileData) -> PioneerResult<()> {
        self.resolve(&object.key)?.put(object, data).await
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        self.resolve(key)?.remove(key).await
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        self.resolve(key)?.stat(key).await
    }

    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        self.resolve(prefix)?.list(prefix, recursive).await
    }

    async fn update(&self, object: Object) -> PioneerResult<()> {
        self.resolve(&object.key)?.update(object).await
    }

    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        self.resolve(key)?.change(key, metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    #[tokio::test]
    async fn round_robin_places_alternating_shards_and_routes_correctly() {
        let shard_a: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let shard_b: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let wrapper = ShardingWrapper::new(shard_a.clone(), shard_b.clone(), ShardPlacement::RoundRobin);

        let key1 = wrapper.place(StoragePath::new("rec1").unwrap()).await;
        let key2 = wrapper.place(StoragePath::new("rec2").unwrap()).await;
        assert_ne!(key1.storage, key2.storage);

        let (object1, data1) = Object::create_file(key1.clone(), b"one".to_vec());
        let (object2, data2) = Object::create_file(key2.clone(), b"two".to_vec());
        wrapper.put(object1, data1.clone()).await.unwrap();
        wrapper.put(object2, data2.clone()).await.unwrap();

        assert_eq!(wrapper.get(&key1).await.unwrap(), data1);
        assert_eq!(wrapper.get(&key2).await.unwrap(), data2);
    }

    #[tokio::test]
    async fn key_from_neither_shard_fails_wrong_shard() {
        let shard_a: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let shard_b: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let wrapper = ShardingWrapper::new(shard_a, shard_b, ShardPlacement::RoundRobin);

        let foreign = StorageKey::new(StorageClientKey::from_raw("Memory@foreign"), StoragePath::new("x").unwrap());
        assert!(matches!(wrapper.get(&foreign).await, Err(PioneerError::WrongShard { .. })));
    }
}
