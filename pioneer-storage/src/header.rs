//! Per-directory [`Header`]: the authoritative listing of a directory's
//! file objects, persisted as the reserved file `._head.json` at the
//! directory's path.

use std::collections::BTreeMap;

use pioneer_core::{PioneerError, PioneerResult, StorageKey};
use serde::{Deserialize, Serialize};

use crate::object::Object;

/// `{ StorageKey → Object }`, serialized as JSON with the key's `Display`
/// form (`"{path}@{storage}"`) as the map key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header {
    entries: BTreeMap<String, Object>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StorageKey) -> Option<&Object> {
        self.entries.get(&key.to_string())
    }

    /// Insert or replace `object` under its own key. Fails if `object` is a
    /// folder — headers only ever list files directly; subdirectories carry
    /// their own header.
    pub fn upsert(&mut self, object: Object) -> PioneerResult<()> {
        if !object.is_file() {
            return Err(PioneerError::SchemaViolation(format!(
                "header entries must be files, got folder at {}",
                object.key
            )));
        }
        self.entries.insert(object.key.to_string(), object);
        Ok(())
    }

    pub fn remove(&mut self, key: &StorageKey) -> Option<Object> {
        self.entries.remove(&key.to_string())
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        self.entries.contains_key(&key.to_string())
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_bytes(&self) -> PioneerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| PioneerError::SerializationError(e.to_string()))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> PioneerResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes).map_err(|e| PioneerError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_core::{StorageClientKey, StoragePath};
    use crate::object::Object;

    fn key(path: &str) -> StorageKey {
        StorageKey::new(StorageClientKey::from_raw("mem@1"), StoragePath::new(path).unwrap())
    }

    #[test]
    fn upsert_and_lookup_round_trips() {
        let mut header = Header::new();
        let (object, _) = Object::create_file(key("a/b.txt"), b"hi".to_vec());
        header.upsert(object.clone()).unwrap();
        assert_eq!(header.get(&key("a/b.txt")), Some(&object));
    }

    #[test]
    fn upsert_rejects_folders() {
        let mut header = Header::new();
        let folder = Object::create_folder(key("a/sub"), 0);
        assert!(header.upsert(folder).is_err());
    }

    #[test]
    fn json_round_trip_preserves_entries() {
        let mut header = Header::new();
        let (object, _) = Object::create_file(key("a/b.txt"), b"hi".to_vec());
        header.upsert(object).unwrap();
        let bytes = header.to_json_bytes().unwrap();
        let restored = Header::from_json_bytes(&bytes).unwrap();
        assert_eq!(restored.len(), 1);
    }
}
