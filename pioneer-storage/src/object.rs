//! The immutable `Object` record: a [`StorageKey`](pioneer_core::StorageKey)
//! paired with [`Metadata`] and a file-or-folder payload description.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use pioneer_core::StorageKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Opaque byte payload. The storage layer always ships `(Object, FileData)`
/// pairs for writes and returns `FileData` alone for reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileData(pub Vec<u8>);

impl FileData {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for FileData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompressionAlgorithm {
    Lz4,
    Gzip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    Aes256Gcm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeInfo {
    pub raw_bytes: u64,
    pub compressed_bytes: Option<u64>,
}

impl SizeInfo {
    pub fn from_data(data: &FileData) -> Self {
        Self { raw_bytes: data.len() as u64, compressed_bytes: None }
    }
}

/// MIME type. Detection here is extension-based; `from_data` falls back to
/// `application/octet-stream` when the name carries no recognized suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSignature {
    pub mime: String,
}

impl Default for TypeSignature {
    fn default() -> Self {
        Self { mime: "application/octet-stream".to_string() }
    }
}

impl TypeSignature {
    pub fn from_name(name: &str) -> Self {
        let mime = match name.rsplit_once('.') {
            Some((_, "json")) => "application/json",
            Some((_, "txt")) => "text/plain",
            Some((_, "html")) => "text/html",
            Some((_, "png")) => "image/png",
            Some((_, "jpg")) | Some((_, "jpeg")) => "image/jpeg",
            Some((_, "gz")) => "application/gzip",
            _ => "application/octet-stream",
        };
        Self { mime: mime.to_string() }
    }
}

/// Hash signature for integrity checking: algorithm name plus hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSignature {
    pub algorithm: String,
    pub signature: String,
}

impl HashSignature {
    pub fn from_data(data: &FileData) -> Self {
        let digest = Sha256::digest(data.as_bytes());
        Self { algorithm: "SHA-256".to_string(), signature: hex_encode(&digest) }
    }

    pub fn matches(&self, data: &FileData) -> bool {
        *self == Self::from_data(data)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}

/// Content description for a `File` item: size, MIME type, integrity hash,
/// and optional compression/encryption tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub size: SizeInfo,
    pub mime_type: TypeSignature,
    pub signature: HashSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionAlgorithm>,
}

impl ContentInfo {
    pub fn from_data(name: &str, data: &FileData) -> Self {
        Self {
            size: SizeInfo::from_data(data),
            mime_type: TypeSignature::from_name(name),
            signature: HashSignature::from_data(data),
            compression: None,
            encryption: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Item {
    File { content: ContentInfo },
    Folder { num_items: usize },
}

impl Item {
    pub fn is_file(&self) -> bool {
        matches!(self, Item::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Item::Folder { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionClass {
    Hot,
    Warm,
    Cold,
    Glacier,
}

impl Default for RetentionClass {
    fn default() -> Self {
        RetentionClass::Hot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionFlags {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl PermissionFlags {
    pub fn owner_default() -> Self {
        Self { read: true, write: true, execute: false }
    }

    pub fn group_default() -> Self {
        Self { read: true, write: true, execute: false }
    }

    pub fn others_default() -> Self {
        Self { read: true, write: false, execute: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub owner: PermissionFlags,
    pub group: PermissionFlags,
    pub others: PermissionFlags,
    /// Named overrides, e.g. `"alice" → {read,write,execute}`.
    #[serde(default)]
    pub acl: std::collections::BTreeMap<String, PermissionFlags>,
}

impl Default for PermissionInfo {
    fn default() -> Self {
        Self {
            owner: PermissionFlags::owner_default(),
            group: PermissionFlags::group_default(),
            others: PermissionFlags::others_default(),
            acl: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTimeInfo {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}

impl Default for AccessTimeInfo {
    fn default() -> Self {
        let now = Utc::now();
        Self { created: now, modified: now, accessed: now }
    }
}

impl AccessTimeInfo {
    pub fn touch_modified(&mut self) {
        let now = Utc::now();
        self.modified = now;
        self.accessed = now;
    }

    pub fn touch_accessed(&mut self) {
        self.accessed = Utc::now();
    }
}

/// Per-object metadata: retention class, permission set, access times, tag
/// set, and a stable identity UUID. Created with the object and mutable
/// only through `StorageClient::change`, which rewrites the containing
/// header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub uuid: Uuid,
    #[serde(default)]
    pub storage: RetentionClass,
    #[serde(default)]
    pub permissions: PermissionInfo,
    pub access: AccessTimeInfo,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            storage: RetentionClass::default(),
            permissions: PermissionInfo::default(),
            access: AccessTimeInfo::default(),
            tags: BTreeSet::new(),
        }
    }
}

/// An immutable storage record: a key, its metadata, and a file-or-folder
/// payload description. Objects themselves never carry the bytes — those
/// travel alongside as [`FileData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub key: StorageKey,
    pub metadata: Metadata,
    pub item: Item,
}

impl Object {
    /// Build a `(Object, FileData)` pair for a file write, computing size,
    /// MIME type, and integrity hash from the payload.
    pub fn create_file(key: StorageKey, raw: Vec<u8>) -> (Self, FileData) {
        let data = FileData(raw);
        let content = ContentInfo::from_data(key.path.name(), &data);
        let object = Self { key, metadata: Metadata::default(), item: Item::File { content } };
        (object, data)
    }

    pub fn create_folder(key: StorageKey, num_items: usize) -> Self {
        Self { key, metadata: Metadata::default(), item: Item::Folder { num_items } }
    }

    pub fn is_file(&self) -> bool {
        self.item.is_file()
    }

    pub fn is_folder(&self) -> bool {
        self.item.is_folder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_core::{StorageClientKey, StoragePath};

    fn key(path: &str) -> StorageKey {
        StorageKey::new(StorageClientKey::from_raw("mem@1"), StoragePath::new(path).unwrap())
    }

    #[test]
    fn create_file_computes_matching_signature() {
        let (object, data) = Object::create_file(key("a/b.txt"), b"hello".to_vec());
        let Item::File { content } = &object.item else { panic!("expected file") };
        assert!(content.signature.matches(&data));
        assert_eq!(content.size.raw_bytes, 5);
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(TypeSignature::from_name("a.json").mime, "application/json");
        assert_eq!(TypeSignature::from_name("a").mime, "application/octet-stream");
    }
}
