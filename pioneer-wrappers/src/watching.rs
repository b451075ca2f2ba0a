//! Watching (4.2.5): holds `{ StorageKey -> Callback }` and fires the
//! callback synchronously, on the caller's task, after a `put`/`remove`
//! succeeds. Cancellation is by de-registration only.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use pioneer_core::{PioneerResult, StorageClientKey, StorageKey, StoragePath};
use pioneer_storage::{FileData, Medium, Metadata, Object, StorageClient};

/// A registered watcher. Boxed so callers can pass closures or function
/// pointers interchangeably.
pub type Callback = Arc<dyn Fn(&StorageKey) + Send + Sync>;

pub struct WatchingWrapper {
    inner: Arc<dyn StorageClient>,
    callbacks: DashMap<StorageKey, Callback>,
}

impl WatchingWrapper {
    pub fn new(inner: Arc<dyn StorageClient>) -> Arc<Self> {
        Arc::new(Self { inner, callbacks: DashMap::new() })
    }

    pub fn watch(&self, key: StorageKey, callback: Callback) {
        self.callbacks.insert(key, callback);
    }

    pub fn unwatch(&self, key: &StorageKey) {
        self.callbacks.remove(key);
    }

    fn fire(&self, key: &StorageKey) {
        if let Some(entry) = self.callbacks.get(key) {
            (entry.value())(key);
        }
    }
}

#[async_trait]
impl StorageClient for WatchingWrapper {
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
        let key = object.key.clone();
        self.inner.put(object, data).await?;
        self.fire(&key);
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        self.inner.remove(key).await?;
        self.fire(key);
        Ok(())
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        self.inner.stat(key).await
    }

    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        self.inner.list(prefix, recursive).await
    }

    async fn update(&self, object: Object) -> PioneerResult<()> {
        let key = object.key.clone();
        self.inner.update(object).await?;
        self.fire(&key);
        Ok(())
    }

    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        self.inner.change(key, metadata).await?;
        self.fire(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn put_and_remove_fire_registered_callback() {
        let inner = MemoryClient::new().await.unwrap();
        let wrapper = WatchingWrapper::new(inner);
        let key = StorageKey::new(wrapper.identity().clone(), StoragePath::new("a.txt").unwrap());

        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        wrapper.watch(key.clone(), Arc::new(move |_k| { counted.fetch_add(1, Ordering::SeqCst); }));

        let (object, data) = Object::create_file(key.clone(), b"hi".to_vec());
        wrapper.put(object, data).await.unwrap();
        wrapper.remove(&key).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unwatch_stops_future_callbacks() {
        let inner = MemoryClient::new().await.unwrap();
        let wrapper = WatchingWrapper::new(inner);
        let key = StorageKey::new(wrapper.identity().clone(), StoragePath::new("a.txt").unwrap());

        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        wrapper.watch(key.clone(), Arc::new(move |_k| { counted.fetch_add(1, Ordering::SeqCst); }));
        wrapper.unwatch(&key);

        let (object, data) = Object::create_file(key.clone(), b"hi".to_vec());
        wrapper.put(object, data).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
