//! Overlay (4.2.2): a read-through cache of a `base` backend through an
//! `overlay` backend. Reads prefer the overlay, falling back to base.
//! Writes go to the overlay; with `symmetric = true` they also go to base.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use pioneer_core::{PioneerError, StorageClientKey, StorageKey, StoragePath};
use pioneer_core::PioneerResult;
use pioneer_storage::{FileData, Medium, Metadata, Object, StorageClient};
use tracing::warn;

pub struct OverlayWrapper {
    base: Arc<dyn StorageClient>,
    overlay: Arc<dyn StorageClient>,
    symmetric: bool,
}

impl OverlayWrapper {
    pub fn new(base: Arc<dyn StorageClient>, overlay: Arc<dyn StorageClient>, symmetric: bool) -> Arc<Self> {
        Arc::new(Self { base, overlay, symmetric })
    }
}

#[async_trait]
impl StorageClient for OverlayWrapper {
    fn identity(&self) -> &StorageClientKey {
        self.overlay.identity()
    }

    fn medium(&self) -> Medium {
        self.overlay.medium()
    }

    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>> {
        match self.overlay.raw_get(path).await {
            Err(PioneerError::NotFound(_)) => self.base.raw_get(path).await,
            other => other,
        }
    }

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()> {
        self.overlay.raw_put(path, bytes.clone()).await?;
        if self.symmetric {
            self.base.raw_put(path, bytes).await?;
        }
        Ok(())
    }

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()> {
        self.overlay.raw_remove(path).await?;
        if self.symmetric {
            self.base.raw_remove(path).await?;
        }
        Ok(())
    }

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool> {
        Ok(self.overlay.raw_exists(path).await? || self.base.raw_exists(path).await?)
    }

    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>> {
        let mut names: std::collections::BTreeSet<String> =
            self.overlay.child_directories(prefix).await?.into_iter().collect();
        names.extend(self.base.child_directories(prefix).await?);
        Ok(names.into_iter().collect())
    }

    async fn get(&self, key: &StorageKey) -> PioneerResult<FileData> {
        match self.overlay.get(key).await {
            Err(PioneerError::NotFound(_)) => self.base.get(key).await,
            other => other,
        }
    }

    async fn put(&self, object: Object, data: FileData) -> PioneerResult<()> {
        self.overlay.put(object.clone(), data.clone()).await?;
        if self.symmetric {
            self.base.put(object, data).await?;
        }
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        let overlay_result = self.overlay.remove(key).await;
        if self.symmetric {
            let base_result = self.base.remove(key).await;
            overlay_result.or(base_result)
        } else {
            overlay_result
        }
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        match self.overlay.stat(key).await {
            Err(PioneerError::NotFound(_)) => self.base.stat(key).await,
            other => other,
        }
    }

    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        let mut seen: BTreeMap<String, StorageKey> = BTreeMap::new();
        for key in self.overlay.list(prefix, recursive).await? {
            seen.insert(key.to_string(), key);
        }
        for key in self.base.list(prefix, recursive).await? {
            seen.entry(key.to_string()).or_insert(key);
        }
        Ok(seen.into_values().collect())
    }

    async fn update(&self, object: Object) -> PioneerResult<()> {
        self.overlay.update(object.clone()).await?;
        if self.symmetric {
            self.base.update(object).await?;
        }
        Ok(())
    }

    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        self.overlay.change(key, metadata.clone()).await?;
        if self.symmetric {
            if let Err(e) = self.base.change(key, metadata).await {
                warn!(error = %e, key = %key, "overlay symmetric change on base failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_core::StoragePath;
    use pioneer_storage::MemoryClient;

    async fn pair() -> (Arc<dyn StorageClient>, Arc<dyn StorageClient>) {
        (MemoryClient::new().await.unwrap(), MemoryClient::new().await.unwrap())
    }

    #[tokio::test]
    async fn asymmetric_write_reads_from_overlay_then_falls_back_to_base() {
        let (base, overlay) = pair().await;
        let wrapper = OverlayWrapper::new(base, overlay.clone(), false);
        let key = StorageKey::new(overlay.identity().clone(), StoragePath::new("a.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"overlay-value".to_vec());
        wrapper.put(object, data.clone()).await.unwrap();
        assert_eq!(wrapper.get(&key).await.unwrap(), data);

        wrapper.remove(&key).await.unwrap();
        assert!(wrapper.get(&key).await.is_err());
    }

    #[tokio::test]
    async fn list_returns_union_of_both_backends() {
        let (base, overlay) = pair().await;
        let wrapper = OverlayWrapper::new(base.clone(), overlay.clone(), false);

        let base_key = StorageKey::new(base.identity().clone(), StoragePath::new("dir/base.txt").unwrap());
        let (object, data) = Object::create_file(base_key.clone(), b"b".to_vec());
        base.put(object, data).await.unwrap();

        let overlay_key = StorageKey::new(overlay.identity().clone(), StoragePath::new("dir/overlay.txt").unwrap());
        let (object, data) = Object::create_file(overlay_key.clone(), b"o".to_vec());
        overlay.put(object, data).await.unwrap();

        let listed = wrapper.list(&base_key.parent(), false).await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
