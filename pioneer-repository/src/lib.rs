//! [`Repository`] (C9): a typed mapping surface over a storage client
//! rooted at a path, built on the storage contract (C4) via the Safety
//! wrapper. [`DataRepository`] is the concrete instantiation over
//! [`Data`] records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pioneer_core::{PioneerError, PioneerResult, StorageKey, StoragePath};
use pioneer_data::Data;
use pioneer_storage::{Object, StorageClient};
use pioneer_wrappers::SafetyWrapper;

/// Dict-like surface over a string-keyed collection of `V`s. Every method
/// mirrors a Python `dict` operation of the same name.
#[async_trait]
pub trait Repository<V: Send + Sync>: Send + Sync {
    async fn get(&self, key: &str) -> PioneerResult<V>;

    async fn get_or(&self, key: &str, default: V) -> V;

    async fn set(&self, key: &str, value: V) -> PioneerResult<()>;

    /// Removes and returns the value at `key`.
    async fn pop(&self, key: &str) -> PioneerResult<V>;

    /// Removes and returns an arbitrary `(key, value)` pair. `NotFound`
    /// if the repository is empty.
    async fn popitem(&self) -> PioneerResult<(String, V)>;

    /// Bulk-upserts every entry in `values`, like `dict.update`.
    async fn update(&self, values: HashMap<String, V>) -> PioneerResult<()>;

    /// Returns the existing value at `key`, or inserts and returns
    /// `default` if absent.
    async fn setdefault(&self, key: &str, default: V) -> PioneerResult<V>;

    async fn keys(&self) -> PioneerResult<Vec<String>>;

    async fn values(&self) -> PioneerResult<Vec<V>>;

    async fn items(&self) -> PioneerResult<Vec<(String, V)>>;

    async fn contains(&self, key: &str) -> bool;

    async fn len(&self) -> PioneerResult<usize>;

    async fn is_empty(&self) -> PioneerResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Stores serialized [`Data`] records named by string keys, joined
/// under `root/`. Always wraps its backend in [`SafetyWrapper`].
pub struct DataRepository {
    storage: Arc<dyn StorageClient>,
    root: StoragePath,
}

impl DataRepository {
    pub fn new(backend: Arc<dyn StorageClient>, root: StoragePath) -> Self {
        Self { storage: SafetyWrapper::new(backend), root }
    }

    fn entry_key(&self, key: &str) -> StorageKey {
        StorageKey::new(self.storage.identity().clone(), self.root.join(key))
    }

    fn listing_key(&self) -> StorageKey {
        StorageKey::new(self.storage.identity().clone(), self.root.clone())
    }
}

#[async_trait]
impl Repository<Data> for DataRepository {
    async fn get(&self, key: &str) -> PioneerResult<Data> {
        let bytes = self.storage.get(&self.entry_key(key)).await?;
        let json: serde_json::Value =
            serde_json::from_slice(bytes.as_bytes()).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
        Data::from_json(json).map_err(|e| PioneerError::SerializationError(e.to_string()))
    }

    async fn get_or(&self, key: &str, default: Data) -> Data {
        self.get(key).await.unwrap_or(default)
    }

    async fn set(&self, key: &str, value: Data) -> PioneerResult<()> {
        let bytes =
            serde_json::to_vec(&value.to_json()).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
        let (object, data) = Object::create_file(self.entry_key(key), bytes);
        if self.storage.exists(&self.entry_key(key)).await {
            self.storage.remove(&self.entry_key(key)).await?;
        }
        self.storage.put(object, data).await
    }

    async fn pop(&self, key: &str) -> PioneerResult<Data> {
        let value = self.get(key).await?;
        self.storage.remove(&self.entry_key(key)).await?;
        Ok(value)
    }

    async fn popitem(&self) -> PioneerResult<(String, Data)> {
        let keys = self.keys().await?;
        let key = keys.into_iter().next().ok_or_else(|| PioneerError::NotFound(self.root.to_string()))?;
        let value = self.pop(&key).await?;
        Ok((key, value))
    }

    async fn update(&self, values: HashMap<String, Data>) -> PioneerResult<()> {
        for (key, value) in values {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    async fn setdefault(&self, key: &str, default: Data) -> PioneerResult<Data> {
        match self.get(key).await {
            Ok(existing) => Ok(existing),
            Err(PioneerError::NotFound(_)) => {
                self.set(key, default.clone()).await?;
                Ok(default)
            }
            Err(e) => Err(e),
        }
    }

    async fn keys(&self) -> PioneerResult<Vec<String>> {
        let listed = self.storage.list(&self.listing_key(), false).await?;
        Ok(listed.into_iter().map(|k| k.path.name().to_string()).collect())
    }

    async fn values(&self) -> PioneerResult<Vec<Data>> {
        let mut out = Vec::new();
        for key in self.keys().await? {
            out.push(self.get(&key).await?);
        }
        Ok(out)
    }

    async fn items(&self) -> PioneerResult<Vec<(String, Data)>> {
        let mut out = Vec::new();
        for key in self.keys().await? {
            let value = self.get(&key).await?;
            out.push((key, value));
        }
        Ok(out)
    }

    async fn contains(&self, key: &str) -> bool {
        self.storage.exists(&self.entry_key(key)).await
    }

    async fn len(&self) -> PioneerResult<usize> {
        Ok(self.keys().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    fn data(json: serde_json::Value) -> Data {
        Data::from_json(json).unwrap()
    }

    async fn repo() -> DataRepository {
        let backend = MemoryClient::new().await.unwrap();
        DataRepository::new(backend, StoragePath::new("repo").unwrap())
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let repo = repo().await;
        repo.set("a", data(serde_json::json!({"x": 1}))).await.unwrap();
        assert_eq!(repo.get("a").await.unwrap(), data(serde_json::json!({"x": 1})));
    }

    #[tokio::test]
    async fn pop_removes_and_returns() {
        let repo = repo().await;
        repo.set("a", data(serde_json::json!({"x": 1}))).await.unwrap();
        let popped = repo.pop("a").await.unwrap();
        assert_eq!(popped, data(serde_json::json!({"x": 1})));
        assert!(!repo.contains("a").await);
    }

    #[tokio::test]
    async fn setdefault_only_writes_on_absence() {
        let repo = repo().await;
        let first = repo.setdefault("a", data(serde_json::json!({"x": 1}))).await.unwrap();
        let second = repo.setdefault("a", data(serde_json::json!({"x": 2}))).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.get("a").await.unwrap(), data(serde_json::json!({"x": 1})));
    }

    #[tokio::test]
    async fn keys_values_items_and_len_agree() {
        let repo = repo().await;
        repo.set("a", data(serde_json::json!({}))).await.unwrap();
        repo.set("b", data(serde_json::json!({}))).await.unwrap();
        assert_eq!(repo.len().await.unwrap(), 2);
        let mut keys = repo.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(repo.values().await.unwrap().len(), 2);
        assert_eq!(repo.items().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn popitem_on_empty_repository_fails_not_found() {
        let repo = repo().await;
        assert!(matches!(repo.popitem().await, Err(PioneerError::NotFound(_))));
    }
}
