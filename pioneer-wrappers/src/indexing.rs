//! Indexing (4.2.7): maintains an in-memory mirror of `str(key.path) ->
//! Object`, persisted into a *separate* storage client so a restart can
//! reload the index instead of re-scanning the wrapped client.
//!
//! On first wrap, the index is built from whatever is already persisted
//! in the index store; if that's empty (a fresh index store), it falls
//! back to a recursive `list` + `stat` over the wrapped client. `stat`
//! consults the cache first and
//! lazily back-fills on miss; `list` is answered from cache keys by
//! prefix + depth filtering rather than touching the wrapped client at all.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use pioneer_core::{PioneerError, PioneerResult, StorageClientKey, StorageKey, StoragePath};
use pioneer_storage::{FileData, Medium, Metadata, Object, StorageClient};
use tracing::{debug, warn};

pub struct IndexingWrapper {
    inner: Arc<dyn StorageClient>,
    index_store: Arc<dyn StorageClient>,
    cache: DashMap<String, Object>,
}

impl IndexingWrapper {
    /// Wrap `inner`, building the index from `index_store` (or, if that's
    /// empty, a full recursive scan of `inner`).
    pub async fn wrap(inner: Arc<dyn StorageClient>, index_store: Arc<dyn StorageClient>) -> PioneerResult<Arc<Self>> {
        let wrapper = Arc::new(Self { inner, index_store, cache: DashMap::new() });
        wrapper.rebuild().await?;
        Ok(wrapper)
    }

    async fn rebuild(&self) -> PioneerResult<()> {
        let index_root = StorageKey::new(self.index_store.identity().clone(), StoragePath::root());
        let existing = self.index_store.list(&index_root, true).await.unwrap_or_default();
        if !existing.is_empty() {
            for index_key in existing {
                if let Ok(data) = self.index_store.get(&index_key).await {
                    match serde_json::from_slice::<Object>(data.as_bytes()) {
                        Ok(object) => {
                            self.cache.insert(object.key.path.as_str().to_string(), object);
                        }
                        Err(e) => warn!(error = %e, key = %index_key, "skipping unparseable index entry"),
                    }
                }
            }
            debug!(entries = self.cache.len(), "index loaded from index store");
            return Ok(());
        }

        let inner_root = StorageKey::new(self.inner.identity().clone(), StoragePath::root());
        for key in self.inner.list(&inner_root, true).await? {
            if let Ok(object) = self.inner.stat(&key).await {
                self.cache.insert(key.path.as_str().to_string(), object.clone());
                self.persist_entry(&object).await.ok();
            }
        }
        debug!(entries = self.cache.len(), "index rebuilt from a full scan of the wrapped client");
        Ok(())
    }

    async fn persist_entry(&self, object: &Object) -> PioneerResult<()> {
        let encoded = serde_json::to_vec(object).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
        let index_key = StorageKey::new(self.index_store.identity().clone(), object.key.path.clone());
        let (index_object, index_data) = Object::create_file(index_key, encoded);
        self.index_store.put(index_object, index_data).await
    }

    async fn drop_entry(&self, key: &StorageKey) -> PioneerResult<()> {
        let index_key = StorageKey::new(self.index_store.identity().clone(), key.path.clone());
        match self.index_store.remove(&index_key).await {
            Ok(()) | Err(PioneerError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl StorageClient for IndexingWrapper {
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
        self.inner.get(key).await
    }

    async fn put(&self, object: Object, data: FileData) -> PioneerResult<()> {
        self.inner.put(object.clone(), data).await?;
        self.cache.insert(object.key.path.as_str().to_string(), object.clone());
        self.persist_entry(&object).await
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        self.inner.remove(key).await?;
        self.cache.remove(key.path.as_str());
        self.drop_entry(key).await
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        if let Some(object) = self.cache.get(key.path.as_str()) {
            return Ok(object.clone());
        }
        let object = self.inner.stat(key).await?;
        self.cache.insert(key.path.as_str().to_string(), object.clone());
        self.persist_entry(&object).await.ok();
        Ok(object)
    }

    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        let prefix_str = prefix.path.as_str();
        let base_depth = prefix.path.parts().len();
        let mut out = Vec::new();
        for entry in self.cache.iter() {
            let path_str = entry.key().as_str();
            let under_prefix = prefix_str.is_empty()
                || path_str == prefix_str
                || path_str.starts_with(&format!("{prefix_str}/"));
            if !under_prefix || path_str == prefix_str {
                continue;
            }
            let depth = path_str.split('/').filter(|s| !s.is_empty()).count();
            if !recursive && depth != base_depth + 1 {
                continue;
            }
            out.push(StorageKey::new(prefix.storage.clone(), StoragePath::new(path_str).expect("cached path is valid")));
        }
        Ok(out)
    }

    async fn update(&self, object: Object) -> PioneerResult<()> {
        self.inner.update(object.clone()).await?;
        self.cache.insert(object.key.path.as_str().to_string(), object.clone());
        self.persist_entry(&object).await
    }

    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        self.inner.change(key, metadata).await?;
        let refreshed = self.inner.stat(key).await?;
        self.cache.insert(key.path.as_str().to_string(), refreshed.clone());
        self.persist_entry(&refreshed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    #[tokio::test]
    async fn stat_is_served_from_cache_after_put() {
        let inner: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let index_store: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let wrapper = IndexingWrapper::wrap(inner, index_store).await.unwrap();

        let key = StorageKey::new(wrapper.identity().clone(), StoragePath::new("a.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hi".to_vec());
        wrapper.put(object.clone(), data).await.unwrap();

        assert_eq!(wrapper.stat(&key).await.unwrap(), object);
    }

    #[tokio::test]
    async fn index_rebuilds_from_a_pre_populated_wrapped_client() {
        let inner: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let key = StorageKey::new(inner.identity().clone(), StoragePath::new("pre-existing.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"already here".to_vec());
        inner.put(object, data).await.unwrap();

        let index_store: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let wrapper = IndexingWrapper::wrap(inner, index_store).await.unwrap();

        assert!(wrapper.exists(&key).await);
    }

    #[tokio::test]
    async fn list_matches_depth_filtered_cache_entries() {
        let inner: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let index_store: Arc<dyn StorageClient> = MemoryClient::new().await.unwrap();
        let wrapper = IndexingWrapper::wrap(inner, index_store).await.unwrap();

        let key = StorageKey::new(wrapper.identity().clone(), StoragePath::new("dir/a.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hi".to_vec());
        wrapper.put(object, data).await.unwrap();

        let listed = wrapper.list(&key.parent(), false).await.unwrap();
        assert!(listed.contains(&key));
    }
}
