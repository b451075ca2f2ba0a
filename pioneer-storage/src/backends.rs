//! Concrete [`StorageClient`] backends: `Memory`, `Local`, and an
//! S3-compatible client built on `object_store`. None of them implement
//! their own headers — header maintenance lives entirely in the trait's
//! default methods.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectStorePath;
use object_store::ObjectStore;
use pioneer_core::{reserved, PioneerError, PioneerResult, StorageClientKey, StoragePath};
use tracing::debug;

use crate::client::{ClientInfo, Medium, StorageClient};

fn not_found(path: &StoragePath) -> PioneerError {
    PioneerError::NotFound(path.to_string())
}

/// Load an existing `._info.json` or mint and persist a fresh one, using
/// whatever raw byte accessors the caller provides. Every backend's `new()`
/// calls this once, before the backend is handed out as a trait object.
async fn load_or_create_identity(
    class_name: &str,
    read: impl std::future::Future<Output = PioneerResult<Vec<u8>>>,
    write: impl FnOnce(Vec<u8>) -> std::pin::Pin<Box<dyn std::future::Future<Output = PioneerResult<()>> + Send>>,
) -> PioneerResult<StorageClientKey> {
    let info = match read.await {
        Ok(bytes) => serde_json::from_slice::<ClientInfo>(&bytes)
            .map_err(|e| PioneerError::SerializationError(e.to_string()))?,
        Err(PioneerError::NotFound(_)) => {
            let info = ClientInfo::default();
            let bytes = serde_json::to_vec(&info).map_err(|e| PioneerError::SerializationError(e.to_string()))?;
            write(bytes).await?;
            info
        }
        Err(e) => return Err(e),
    };
    Ok(StorageClientKey::new(class_name, info.uuid))
}

/// In-process, non-persistent backend keyed by [`StoragePath`]. Used for
/// tests and as the index wrapper's private document store.
pub struct MemoryClient {
    identity: StorageClientKey,
    data: DashMap<String, Vec<u8>>,
}

impl MemoryClient {
    pub async fn new() -> PioneerResult<Arc<Self>> {
        let data: DashMap<String, Vec<u8>> = DashMap::new();
        let identity = load_or_create_identity(
            "Memory",
            async {
                data.get(reserved::INFO_FILE)
                    .map(|v| v.clone())
                    .ok_or_else(|| not_found(&StoragePath::root().join(reserved::INFO_FILE)))
            },
            {
                let data = data.clone();
                move |bytes| Box::pin(async move {
                    data.insert(reserved::INFO_FILE.to_string(), bytes);
                    Ok(())
                })
            },
        )
        .await?;
        Ok(Arc::new(Self { identity, data }))
    }
}

#[async_trait]
impl StorageClient for MemoryClient {
    fn identity(&self) -> &StorageClientKey {
        &self.identity
    }

    fn medium(&self) -> Medium {
        Medium::Local
    }

    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>> {
        self.data.get(path.as_str()).map(|v| v.clone()).ok_or_else(|| not_found(path))
    }

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()> {
        self.data.insert(path.as_str().to_string(), bytes);
        Ok(())
    }

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()> {
        self.data.remove(path.as_str()).map(|_| ()).ok_or_else(|| not_found(path))
    }

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool> {
        Ok(self.data.contains_key(path.as_str()))
    }

    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>> {
        let prefix_str = prefix.as_str();
        let depth = prefix.parts().len();
        let mut names = std::collections::BTreeSet::new();
        for entry in self.data.iter() {
            let candidate = entry.key();
            if !prefix_str.is_empty() && !candidate.starts_with(prefix_str) {
                continue;
            }
            let parts: Vec<&str> = candidate.split('/').filter(|s| !s.is_empty()).collect();
            if parts.len() > depth + 1 {
                names.insert(parts[depth].to_string());
            }
        }
        Ok(names.into_iter().collect())
    }
}

/// Filesystem-backed client rooted at a local directory.
pub struct LocalClient {
    identity: StorageClientKey,
    root: PathBuf,
}

impl LocalClient {
    pub async fn new(root: impl Into<PathBuf>) -> PioneerResult<Arc<Self>> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| PioneerError::BackendError(e.into()))?;
        let info_path = root.join(reserved::INFO_FILE);
        let identity = load_or_create_identity(
            "Local",
            async {
                tokio::fs::read(&info_path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        PioneerError::NotFound(info_path.display().to_string())
                    } else {
                        PioneerError::BackendError(e.into())
                    }
                })
            },
            {
                let info_path = info_path.clone();
                move |bytes| Box::pin(async move {
                    tokio::fs::write(&info_path, bytes).await.map_err(|e| PioneerError::BackendError(e.into()))
                })
            },
        )
        .await?;
        Ok(Arc::new(Self { identity, root }))
    }

    fn resolve(&self, path: &StoragePath) -> PathBuf {
        self.root.join(path.as_str())
    }
}

#[async_trait]
impl StorageClient for LocalClient {
    fn identity(&self) -> &StorageClientKey {
        &self.identity
    }

    fn medium(&self) -> Medium {
        Medium::Local
    }

    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>> {
        tokio::fs::read(self.resolve(path)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                not_found(path)
            } else {
                PioneerError::BackendError(e.into())
            }
        })
    }

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| PioneerError::BackendError(e.into()))?;
        }
        tokio::fs::write(&full, bytes).await.map_err(|e| PioneerError::BackendError(e.into()))
    }

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()> {
        tokio::fs::remove_file(self.resolve(path)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                not_found(path)
            } else {
                PioneerError::BackendError(e.into())
            }
        })
    }

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool> {
        Ok(tokio::fs::metadata(self.resolve(path)).await.is_ok())
    }

    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>> {
        let dir = self.resolve(prefix);
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(PioneerError::BackendError(e.into())),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| PioneerError::BackendError(e.into()))? {
            let file_type = entry.file_type().await.map_err(|e| PioneerError::BackendError(e.into()))?;
            if file_type.is_dir() {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }
}

/// S3-compatible client built on `object_store`'s `AmazonS3` driver — works
/// against AWS S3 itself or any MinIO-style endpoint that speaks the same API.
pub struct S3Client {
    identity: StorageClientKey,
    store: Arc<dyn ObjectStore>,
}

impl S3Client {
    pub async fn new(
        bucket: &str,
        endpoint: Option<&str>,
        region: Option<&str>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
    ) -> PioneerResult<Arc<Self>> {
        let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(access_key) = access_key {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        let store: Arc<dyn ObjectStore> =
            Arc::new(builder.build().map_err(|e| PioneerError::BackendError(e.into()))?);

        let info_path = object_path(reserved::INFO_FILE);
        let identity = load_or_create_identity(
            "S3",
            async {
                match store.get(&info_path).await {
                    Ok(result) => {
                        let bytes = result.bytes().await.map_err(|e| PioneerError::BackendError(e.into()))?;
                        Ok(bytes.to_vec())
                    }
                    Err(object_store::Error::NotFound { .. }) => Err(not_found(&StoragePath::new(reserved::INFO_FILE).unwrap())),
                    Err(e) => Err(PioneerError::BackendError(e.into())),
                }
            },
            {
                let store = Arc::clone(&store);
                let info_path = info_path.clone();
                move |bytes| Box::pin(async move {
                    store.put(&info_path, bytes.into()).await.map_err(|e| PioneerError::BackendError(e.into()))?;
                    Ok(())
                })
            },
        )
        .await?;

        debug!(bucket, "S3 client ready");
        Ok(Arc::new(Self { identity, store }))
    }
}

fn object_path(storage_path_str: &str) -> ObjectStorePath {
    ObjectStorePath::from(storage_path_str)
}

#[async_trait]
impl StorageClient for S3Client {
    fn identity(&self) -> &StorageClientKey {
        &self.identity
    }

    fn medium(&self) -> Medium {
        Medium::Remote
    }

    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>> {
        let key = object_path(path.as_str());
        match self.store.get(&key).await {
            Ok(result) => {
                let bytes = result.bytes().await.map_err(|e| PioneerError::BackendError(e.into()))?;
                Ok(bytes.to_vec())
            }
            Err(object_store::Error::NotFound { .. }) => Err(not_found(path)),
            Err(e) => Err(PioneerError::BackendError(e.into())),
        }
    }

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()> {
        let key = object_path(path.as_str());
        self.store.put(&key, bytes.into()).await.map_err(|e| PioneerError::BackendError(e.into()))?;
        Ok(())
    }

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()> {
        let key = object_path(path.as_str());
        self.store.delete(&key).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => not_found(path),
            e => PioneerError::BackendError(e.into()),
        })
    }

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool> {
        let key = object_path(path.as_str());
        Ok(self.store.head(&key).await.is_ok())
    }

    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>> {
        let key = object_path(prefix.as_str());
        let listing = self
            .store
            .list_with_delimiter(Some(&key))
            .await
            .map_err(|e| PioneerError::BackendError(e.into()))?;
        let mut names: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|p| p.filename().map(|s| s.to_string()))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Resolved backend choice for a named storage endpoint, used by the root
/// binary's wiring to turn a [`pioneer_core::StorageEndpointConfig`] into a
/// live client. Kept as a plain enum rather than trait-object construction
/// sugar so callers can match on it when a backend-specific override is
/// needed.
pub enum BackendKind {
    Memory,
    Local(PathBuf),
    S3 { bucket: String, endpoint: Option<String>, region: Option<String>, access_key: Option<String>, secret_key: Option<String> },
}

pub async fn build_backend(kind: BackendKind) -> PioneerResult<Arc<dyn StorageClient>> {
    match kind {
        BackendKind::Memory => Ok(MemoryClient::new().await? as Arc<dyn StorageClient>),
        BackendKind::Local(root) => Ok(LocalClient::new(root).await? as Arc<dyn StorageClient>),
        BackendKind::S3 { bucket, endpoint, region, access_key, secret_key } => {
            let client = S3Client::new(
                &bucket,
                endpoint.as_deref(),
                region.as_deref(),
                access_key.as_deref(),
                secret_key.as_deref(),
            )
            .await?;
            Ok(client as Arc<dyn StorageClient>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_core::{StorageKey, StoragePath};
    use crate::object::Object;

    #[tokio::test]
    async fn memory_put_then_get_round_trips() {
        let client = MemoryClient::new().await.unwrap();
        let key = StorageKey::new(client.identity().clone(), StoragePath::new("a/b.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hello".to_vec());
        client.put(object, data.clone()).await.unwrap();
        assert_eq!(client.get(&key).await.unwrap(), data);
    }

    #[tokio::test]
    async fn memory_put_registers_in_parent_header() {
        let client = MemoryClient::new().await.unwrap();
        let key = StorageKey::new(client.identity().clone(), StoragePath::new("a/b.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hello".to_vec());
        client.put(object, data).await.unwrap();
        let listed = client.list(&key.parent(), false).await.unwrap();
        assert!(listed.contains(&key));
    }

    #[tokio::test]
    async fn memory_remove_then_exists_false() {
        let client = MemoryClient::new().await.unwrap();
        let key = StorageKey::new(client.identity().clone(), StoragePath::new("a/b.txt").unwrap());
        let (object, data) = Object::create_file(key.clone(), b"hello".to_vec());
        client.put(object, data).await.unwrap();
        client.remove(&key).await.unwrap();
        assert!(!client.exists(&key).await);
    }

    #[tokio::test]
    async fn local_client_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key;
        {
            let client = LocalClient::new(dir.path()).await.unwrap();
            key = StorageKey::new(client.identity().clone(), StoragePath::new("x.txt").unwrap());
            let (object, data) = Object::create_file(key.clone(), b"persisted".to_vec());
            client.put(object, data).await.unwrap();
        }
        let client2 = LocalClient::new(dir.path()).await.unwrap();
        let data = client2.raw_get(&key.path).await.unwrap();
        assert_eq!(data, b"persisted");
    }
}
