//! Address space primitives: [`StorageClientKey`], [`StoragePath`], and the
//! combined [`StorageKey`] that is the sole addressing unit of the storage
//! layer.
//!
//! `StorageKey` is kept a pure value — no back-reference to a live client —
//! so that paths can be hashed, cloned, and sent across threads freely.
//! Resolving a key's client is the caller's job: a node holds its live
//! clients in its own map (see `PioneerNode::storage` in the root binary)
//! and looks one up by `StorageClientKey` when it needs to dispatch a call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Characters a [`StoragePath`] segment may not contain.
///
/// `/` is the separator and is allowed as structure, not as content of a
/// single call to [`StoragePath::new`] unless it is meant as a separator.
const FORBIDDEN_PATH_CHARS: &[char] = &['\\', '\0', '\n', '\r', '\t'];

/// Opaque token identifying a *live* storage client instance: `ClassName@uuid`.
///
/// Callers resolve this to an actual client by looking it up in whatever map
/// they hold clients in; this type itself never parses the string apart from
/// display/debug purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageClientKey(String);

impl StorageClientKey {
    /// Build a client key in the canonical `ClassName@uuid` form.
    pub fn new(class_name: &str, uuid: uuid::Uuid) -> Self {
        Self(format!("{class_name}@{uuid}"))
    }

    /// Wrap an already-formatted key, e.g. one read back from `._info.json`
    /// or a persisted `Object` JSON blob.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// POSIX-like, forward-slash-separated path. Purely structural: it is never
/// rooted in a concrete filesystem and carries no reference to a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePath(String);

impl StoragePath {
    /// Parse and validate a path, rejecting [`FORBIDDEN_PATH_CHARS`].
    pub fn new(path: impl Into<String>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(c) = path.chars().find(|c| FORBIDDEN_PATH_CHARS.contains(c)) {
            anyhow::bail!("StoragePath {path:?} contains illegal character {c:?}");
        }
        Ok(Self(path))
    }

    /// The root path `""`, the parent of every top-level key.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a child segment onto this path, collapsing duplicate slashes.
    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref().trim_start_matches('/');
        if self.0.is_empty() {
            return Self(segment.to_string());
        }
        if segment.is_empty() {
            return self.clone();
        }
        Self(format!("{}/{}", self.0.trim_end_matches('/'), segment))
    }

    /// Prepend a prefix to this path.
    pub fn prefix(&self, prefix: impl AsRef<str>) -> Self {
        StoragePath::new(prefix.as_ref()).unwrap_or_else(|_| Self::root()).join(&self.0)
    }

    /// Append a raw suffix without inserting a separator.
    pub fn postfix(&self, suffix: impl AsRef<str>) -> Self {
        Self(format!("{}{}", self.0, suffix.as_ref()))
    }

    /// The containing directory: everything before the last `/`.
    pub fn parent(&self) -> Self {
        match self.0.rsplit_once('/') {
            Some((head, _)) => Self(head.to_string()),
            None => Self::root(),
        }
    }

    /// Path segments split on `/`, empty segments dropped.
    pub fn parts(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Final path segment, e.g. `"file.json"` for `"a/b/file.json"`.
    pub fn name(&self) -> &str {
        self.parts().last().copied().unwrap_or("")
    }

    /// File extension of [`Self::name`] including the leading dot, or `""`.
    pub fn suffix(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx..],
            _ => "",
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The sole addressing unit of the storage layer: a client identity paired
/// with a structural path within that client's key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    pub storage: StorageClientKey,
    pub path: StoragePath,
}

impl StorageKey {
    pub fn new(storage: StorageClientKey, path: StoragePath) -> Self {
        Self { storage, path }
    }

    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        Self {
            storage: self.storage.clone(),
            path: self.path.join(segment),
        }
    }

    pub fn parent(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            path: self.path.parent(),
        }
    }

    /// Retarget this key at a different client, keeping the path — used by
    /// the replication wrapper to address the replica's copy of an object.
    pub fn retarget(&self, storage: StorageClientKey) -> Self {
        Self { storage, path: self.path.clone() }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_collapses_slashes() {
        let p = StoragePath::new("a/b/").unwrap();
        assert_eq!(p.join("/c").as_str(), "a/b/c");
    }

    #[test]
    fn parent_of_top_level_is_root() {
        let p = StoragePath::new("file.json").unwrap();
        assert_eq!(p.parent(), StoragePath::root());
    }

    #[test]
    fn name_and_suffix() {
        let p = StoragePath::new("a/b/file.tar.gz").unwrap();
        assert_eq!(p.name(), "file.tar.gz");
        assert_eq!(p.suffix(), ".gz");
    }

    #[test]
    fn rejects_illegal_characters() {
        assert!(StoragePath::new("a\\b").is_err());
    }

    #[test]
    fn storage_key_hash_equality_is_structural() {
        let a = StorageKey::new(StorageClientKey::from_raw("mem@1"), StoragePath::new("a/b").unwrap());
        let b = StorageKey::new(StorageClientKey::from_raw("mem@1"), StoragePath::new("a/b").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn retarget_keeps_path_changes_client() {
        let a = StorageKey::new(StorageClientKey::from_raw("mem@1"), StoragePath::new("a/b").unwrap());
        let b = a.retarget(StorageClientKey::from_raw("mem@2"));
        assert_eq!(a.path, b.path);
        assert_ne!(a.storage, b.storage);
    }
}
