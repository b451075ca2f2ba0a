//! [`StorageClient`]: the required + derived operations every backend
//! implements, plus directory [`Header`] maintenance shared by all of them.

use async_trait::async_trait;
use pioneer_core::{reserved, PioneerError, PioneerResult, StorageClientKey, StorageKey, StoragePath};

use crate::header::Header;
use crate::object::{FileData, Metadata, Object};

/// Where a backend's bytes actually live, so wrappers can specialize (e.g.
/// Replication only defers to the leader when the primary is `Remote`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Local,
    Remote,
    Distributed,
}

/// Identity record lazily created and persisted as `._info.json` on a
/// client's first access.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientInfo {
    pub uuid: uuid::Uuid,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self { uuid: uuid::Uuid::new_v4() }
    }
}

/// The storage contract implemented by every backend and forwarded (and
/// selectively overridden) by every wrapper in the composition stack.
///
/// Backends implement only the `raw_*` primitives and `child_directories`;
/// `get`/`put`/`remove`/`stat`/`list`/`header`/`update`/`change` and the
/// `_multiple` variants are derived from them here so every backend gets
/// identical header semantics for free.
#[async_trait]
pub trait StorageClient: Send + Sync {
    fn identity(&self) -> &StorageClientKey;

    fn medium(&self) -> Medium;

    /// Read the raw bytes stored at `path`, failing with `NotFound` if
    /// absent. Used both for object payloads and header/info files.
    async fn raw_get(&self, path: &StoragePath) -> PioneerResult<Vec<u8>>;

    async fn raw_put(&self, path: &StoragePath, bytes: Vec<u8>) -> PioneerResult<()>;

    async fn raw_remove(&self, path: &StoragePath) -> PioneerResult<()>;

    async fn raw_exists(&self, path: &StoragePath) -> PioneerResult<bool>;

    /// Names of the immediate subdirectories under `prefix`, used to descend
    /// into subheaders for a recursive `list`. Backends with no native
    /// notion of directories (e.g. `Memory`) derive this from stored keys.
    async fn child_directories(&self, prefix: &StoragePath) -> PioneerResult<Vec<String>>;

    fn header_path(&self, dir: &StoragePath) -> StoragePath {
        dir.join(reserved::HEADER_FILE)
    }

    async fn header(&self, dir: &StorageKey) -> PioneerResult<Header> {
        match self.raw_get(&self.header_path(&dir.path)).await {
            Ok(bytes) => Header::from_json_bytes(&bytes),
            Err(PioneerError::NotFound(_)) => Ok(Header::new()),
            Err(e) => Err(e),
        }
    }

    async fn write_header(&self, dir: &StorageKey, header: &Header) -> PioneerResult<()> {
        self.raw_put(&self.header_path(&dir.path), header.to_json_bytes()?).await
    }

    async fn get(&self, key: &StorageKey) -> PioneerResult<FileData> {
        self.raw_get(&key.path).await.map(FileData::from)
    }

    async fn put(&self, object: Object, data: FileData) -> PioneerResult<()> {
        self.raw_put(&object.key.path, data.0.clone()).await?;
        let parent = object.key.parent();
        let mut header = self.header(&parent).await?;
        header.upsert(object)?;
        self.write_header(&parent, &header).await
    }

    async fn remove(&self, key: &StorageKey) -> PioneerResult<()> {
        self.raw_remove(&key.path).await?;
        let parent = key.parent();
        let mut header = self.header(&parent).await?;
        header.remove(key);
        self.write_header(&parent, &header).await
    }

    async fn stat(&self, key: &StorageKey) -> PioneerResult<Object> {
        let parent = key.parent();
        self.header(&parent)
            .await?
            .get(key)
            .cloned()
            .ok_or_else(|| PioneerError::NotFound(key.to_string()))
    }

    /// List the file keys directly under `prefix`; if `recursive`, also
    /// descend pre-order into every subdirectory's header.
    async fn list(&self, prefix: &StorageKey, recursive: bool) -> PioneerResult<Vec<StorageKey>> {
        let mut out: Vec<StorageKey> = self
            .header(prefix)
            .await?
            .objects()
            .map(|o| o.key.clone())
            .collect();
        if recursive {
            for name in self.child_directories(&prefix.path).await? {
                let child = prefix.join(&name);
                let nested = Box::pin(self.list(&child, true)).await?;
                out.extend(nested);
            }
        }
        Ok(out)
    }

    async fn exists(&self, key: &StorageKey) -> bool {
        self.stat(key).await.is_ok()
    }

    /// Append-or-replace `object` in its directory header without touching
    /// payload bytes.
    async fn update(&self, object: Object) -> PioneerResult<()> {
        let parent = object.key.parent();
        let mut header = self.header(&parent).await?;
        header.upsert(object)?;
        self.write_header(&parent, &header).await
    }

    /// Rewrite the metadata of an existing entry, leaving its payload and
    /// header position untouched.
    async fn change(&self, key: &StorageKey, metadata: Metadata) -> PioneerResult<()> {
        let mut object = self.stat(key).await?;
        object.metadata = metadata;
        self.update(object).await
    }

    async fn get_multiple(&self, keys: &[StorageKey]) -> Vec<PioneerResult<FileData>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await);
        }
        out
    }

    async fn put_multiple(&self, objects: Vec<(Object, FileData)>) -> Vec<PioneerResult<()>> {
        let mut out = Vec::with_capacity(objects.len());
        for (object, data) in objects {
            out.push(self.put(object, data).await);
        }
        out
    }

    async fn stat_multiple(&self, keys: &[StorageKey]) -> Vec<PioneerResult<Object>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.stat(key).await);
        }
        out
    }

    async fn remove_multiple(&self, keys: &[StorageKey]) -> Vec<PioneerResult<()>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.remove(key).await);
        }
        out
    }

    async fn exists_multiple(&self, keys: &[StorageKey]) -> Vec<bool> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.exists(key).await);
        }
        out
    }
}
