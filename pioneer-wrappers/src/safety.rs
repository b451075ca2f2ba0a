//! Safety (4.2.1): rejects every public call on a reserved path and
//! filters reserved paths out of `list`. The only wrapper the repository
//! layer always applies.

use std::sync::Arc;

use async_trait::async_trait;
use pioneer_core::{is_reserved_name, PioneerError, PioneerResult, StorageClientKey, StorageKey, StoragePath};
use pioneer_storage::{FileData, Medium, Metadata, Object, StorageClient};

fn reject_if_reserved(key: &StorageKey) -> PioneerResult<()> {
    if is_reserved_name(key.path.name()) {
        Err(PioneerError::Reserved(key.to_string()))
    } else {
        Ok(())
    }
}

/// Forwards every call to `inner`, first rejecting any public operation
/// that names a reserved key. Internal machinery that needs to touch
/// reserved keys (header maintenance, lease refresh) goes around this
/// wrapper and calls `raw_*`/the backend directly.
pub struct SafetyWrapper {
    inner: Arc<dyn StorageClient>,
}

impl SafetyWrapper {
    pub fn new(inner: Arc<dyn StorageClient>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl StorageClient for SafetyWrapper {
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
        reject_if_reserved(key)?;
        self.inner.get(key).await
    }

    async fn put(&self, object: Object, data: FileData) -> PioneerResult<()> {
        reject_if_reserved(&object.key)?;
        self.inner.put(object, data).await
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        reject_if_reserved(key)?;
        self.inner.remove(key).await
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        reject_if_reserved(key)?;
        self.inner.stat(key).await
    }

    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        let items = self.inner.list(prefix, recursive).await?;
        Ok(items.into_iter().filter(|k| !is_reserved_name(k.path.name())).collect())
    }

    async fn update(&self, object: Object) -> PioneerResult<()> {
        reject_if_reserved(&object.key)?;
        self.inner.update(object).await
    }

    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        reject_if_reserved(key)?;
        self.inner.change(key, metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_core::{reserved, StoragePath};
    use pioneer_storage::MemoryClient;

    async fn wrapped() -> Arc<SafetyWrapper> {
        let backend = MemoryClient::new().await.unwrap();
        SafetyWrapper::new(backend)
    }

    #[tokio::test]
    async fn reserved_key_rejected_on_every_public_op() {
        let safety = wrapped().await;
        let key = StorageKey::new(safety.identity().clone(), StoragePath::new(reserved::HEADER_FILE).unwrap());
        assert!(matches!(safety.get(&key).await, Err(PioneerError::Reserved(_))));
        assert!(matches!(safety.stat(&key).await, Err(PioneerError::Reserved(_))));
        assert!(matches!(safety.remove(&key).await, Err(PioneerError::Reserved(_))));
        let (object, data) = Object::create_file(key.clone(), b"x".to_vec());
        assert!(matches!(safety.put(object, data).await, Err(PioneerError::Reserved(_))));
    }

    #[tokio::test]
    async fn list_never_surfaces_reserved_paths() {
        let safety = wrapped().await;
        let key = StorageKey::new(safety.identity().clone(), StoragePath::new("a/b.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hi".to_vec());
        safety.put(object, data).await.unwrap();
        let listed = safety.list(&key.parent(), false).await.unwrap();
        assert!(listed.iter().all(|k| !is_reserved_name(k.path.name())));
        assert!(listed.contains(&key));
    }
}
