//! [`DatabaseClient`]: a document store layered over a storage client,
//! rooted at `{storage}/database/{name}`. Record bodies live under
//! `data/{key}`; `._database.json` carries the database's
//! [`DatabaseConfig`].

use std::sync::Arc;

use pioneer_core::{is_reserved_name, PioneerError, PioneerResult, StorageKey, StoragePath};
use pioneer_data::{Data, Schema};
use pioneer_storage::{Object, StorageClient};
use pioneer_wrappers::SafetyWrapper;

use crate::config::{DatabaseConfig, DATABASE_CONFIG_FILE};
use crate::query::Query;

pub struct DatabaseClient {
    storage: Arc<dyn StorageClient>,
    root: StoragePath,
}

impl DatabaseClient {
    /// Open (creating if absent) the database named `name` rooted at
    /// `backend`'s `database/{name}`. Always wraps `backend` in
    /// [`SafetyWrapper`] — reserved-key safety is cheap insurance a
    /// document store shouldn't have to opt into.
    pub async fn open(backend: Arc<dyn StorageClient>, name: &str) -> PioneerResult<Self> {
        let storage = SafetyWrapper::new(backend);
        let root = StoragePath::new(format!("database/{name}"))
            .map_err(|e| PioneerError::SchemaViolation(e.to_string()))?;
        let client = Self { storage, root };
        client.ensure_config().await?;
        Ok(client)
    }

    fn data_dir(&self) -> StoragePath {
        self.root.join("data")
    }

    fn record_path(&self, key: &str) -> StoragePath {
        self.data_dir().join(key)
    }

    fn record_key(&self, key: &str) -> StorageKey {
        StorageKey::new(self.storage.identity().clone(), self.record_path(key))
    }

    fn config_key(&self) -> StorageKey {
        StorageKey::new(self.storage.identity().clone(), self.root.join(DATABASE_CONFIG_FILE))
    }

    async fn ensure_config(&self) -> PioneerResult<()> {
        match self.storage.get(&self.config_key()).await {
            Ok(_) => Ok(()),
            Err(PioneerError::NotFound(_)) => self.write_config(&DatabaseConfig::default()).await,
            Err(e) => Err(e),
        }
    }

    async fn write_config(&self, config: &DatabaseConfig) -> PioneerResult<()> {
        let bytes = serde_json::to_vec(config).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
        let (object, data) = Object::create_file(self.config_key(), bytes);
        self.storage.put(object, data).await
    }

    pub async fn config(&self) -> PioneerResult<DatabaseConfig> {
        let bytes = self.storage.get(&self.config_key()).await?;
        serde_json::from_slice(bytes.as_bytes()).map_err(|e| PioneerError::SerializationError(e.to_string()))
    }

    pub async fn set_config(&self, config: DatabaseConfig) -> PioneerResult<()> {
        self.write_config(&config).await
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.storage.exists(&self.record_key(key)).await
    }

    /// Fails with `Exists` if `key` is already present.
    pub async fn insert(&self, key: &str, value: &Data) -> PioneerResult<()> {
        if self.contains(key).await {
            return Err(PioneerError::Exists(key.to_string()));
        }
        self.write(key, value).await
    }

    /// Fails with `NotFound` if `key` is absent; otherwise delete+insert.
    pub async fn update(&self, key: &str, value: &Data) -> PioneerResult<()> {
        if !self.contains(key).await {
            return Err(PioneerError::NotFound(key.to_string()));
        }
        self.storage.remove(&self.record_key(key)).await?;
        self.write(key, value).await
    }

    async fn write(&self, key: &str, value: &Data) -> PioneerResult<()> {
        let bytes =
            serde_json::to_vec(&value.to_json()).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
        let (object, data) = Object::create_file(self.record_key(key), bytes);
        self.storage.put(object, data).await
    }

    pub async fn get(&self, key: &str) -> PioneerResult<Data> {
        let bytes = self.storage.get(&self.record_key(key)).await?;
        let json: serde_json::Value =
            serde_json::from_slice(bytes.as_bytes()).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
        Data::from_json(json).map_err(|e| PioneerError::SerializationError(e.to_string()))
    }

    pub async fn get_or(&self, key: &str, default: Data) -> Data {
        self.get(key).await.unwrap_or(default)
    }

    pub async fn remove(&self, key: &str) -> PioneerResult<()> {
        self.storage.remove(&self.record_key(key)).await
    }

    /// Alias of [`Self::remove`], kept for callers that prefer the
    /// dict-style name.
    pub async fn delete(&self, key: &str) -> PioneerResult<()> {
        self.remove(key).await
    }

    pub async fn merge(&self, key: &str, head: &Data, schema: Option<&Schema>) -> PioneerResult<Data> {
        let old = self.get(key).await?;
        let (_, merged) = Data::merge(&old, head, schema);
        self.storage.remove(&self.record_key(key)).await?;
        self.write(key, &merged).await?;
        Ok(merged)
    }

    /// Enumerate keys under `data/` (optionally narrowed to `prefix`),
    /// filtering out reserved paths.
    pub async fn items(&self, prefix: Option<&str>) -> PioneerResult<Vec<String>> {
        let base = match prefix {
            Some(p) => self.data_dir().join(p),
            None => self.data_dir(),
        };
        let listing_key = StorageKey::new(self.storage.identity().clone(), base);
        let keys = self.storage.list(&listing_key, true).await?;
        let data_prefix = self.data_dir();
        Ok(keys
            .into_iter()
            .filter_map(|k| {
                k.path
                    .as_str()
                    .strip_prefix(data_prefix.as_str())
                    .map(|rest| rest.trim_start_matches('/').to_string())
            })
            .filter(|name| !is_reserved_name(name))
            .collect())
    }

    pub async fn query(&self, query: &Query) -> PioneerResult<Vec<Data>> {
        let mut out = Vec::new();
        for key in self.items(None).await? {
            let Ok(record) = self.get(&key).await else { continue };
            if let Some(result) = query.evaluate(&record)? {
                out.push(result);
            }
        }
        Ok(out)
    }

    /// A sub-client rooted at `root/name`: used for the `Parameter`
    /// paradigm's `tags` namespace, and generally to nest databases.
    pub async fn namespace(&self, name: &str) -> PioneerResult<DatabaseClient> {
        let root = self.root.join(name);
        let client = DatabaseClient { storage: Arc::clone(&self.storage), root };
        client.ensure_config().await?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    async fn db(name: &str) -> DatabaseClient {
        let backend = MemoryClient::new().await.unwrap();
        DatabaseClient::open(backend, name).await.unwrap()
    }

    fn data(json: serde_json::Value) -> Data {
        Data::from_json(json).unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let db = db("random_db").await;
        db.insert("test", &data(serde_json::json!({"test": "test"}))).await.unwrap();
        assert_eq!(db.get("test").await.unwrap(), data(serde_json::json!({"test": "test"})));
    }

    #[tokio::test]
    async fn insert_on_existing_key_fails_exists() {
        let db = db("d").await;
        db.insert("x", &data(serde_json::json!({"a": 1}))).await.unwrap();
        assert!(matches!(db.insert("x", &data(serde_json::json!({"a": 2}))).await, Err(PioneerError::Exists(_))));
    }

    #[tokio::test]
    async fn merge_applies_default_overwrite_strategy() {
        let db = db("d").await;
        db.insert("x", &data(serde_json::json!({"a": 1, "b": 2}))).await.unwrap();
        let merged = db.merge("x", &data(serde_json::json!({"a": 3, "c": 4})), None).await.unwrap();
        assert_eq!(merged, data(serde_json::json!({"a": 3, "b": 2, "c": 4})));
        assert_eq!(db.get("x").await.unwrap(), merged);
    }

    #[tokio::test]
    async fn items_lists_inserted_keys_and_hides_the_config_file() {
        let db = db("d").await;
        db.insert("a", &data(serde_json::json!({}))).await.unwrap();
        db.insert("b", &data(serde_json::json!({}))).await.unwrap();
        let mut keys = db.items(None).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
