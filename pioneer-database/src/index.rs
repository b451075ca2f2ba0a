//! Document database index wrapper (C8.3), distinct from the
//! storage-level `IndexingWrapper` (C5/4.2.7): for every flattened field
//! path of an inserted record, upserts an [`IndexEntry`] of record keys
//! keyed by that path's `repr()` in a dedicated index database.
//! `query` narrows candidates to the union of references for the
//! query's output fields before evaluating the full predicate, instead
//! of scanning every record.

use std::collections::HashSet;

use pioneer_core::{PioneerError, PioneerResult};
use pioneer_data::Data;

use crate::client::DatabaseClient;
use crate::query::Query;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct IndexEntry {
    pub references: Vec<String>,
}

impl IndexEntry {
    fn to_data(&self) -> Data {
        Data::from_json(serde_json::json!({ "references": self.references }))
            .expect("an IndexEntry always serializes to a JSON object")
    }

    fn from_data(data: &Data) -> Self {
        serde_json::from_value(data.to_json()).unwrap_or_default()
    }
}

pub struct IndexedDatabase {
    data: DatabaseClient,
    index: DatabaseClient,
}

impl IndexedDatabase {
    pub fn new(data: DatabaseClient, index: DatabaseClient) -> Self {
        Self { data, index }
    }

    pub async fn insert(&self, key: &str, value: &Data) -> PioneerResult<()> {
        self.data.insert(key, value).await?;
        self.index_record(key, value).await
    }

    pub async fn update(&self, key: &str, value: &Data) -> PioneerResult<()> {
        self.data.update(key, value).await?;
        self.index_record(key, value).await
    }

    /// Removes the record. Stale references left in the index are pruned
    /// lazily: `query` skips any reference whose record no longer exists.
    pub async fn remove(&self, key: &str) -> PioneerResult<()> {
        self.data.remove(key).await
    }

    pub async fn get(&self, key: &str) -> PioneerResult<Data> {
        self.data.get(key).await
    }

    async fn index_record(&self, key: &str, value: &Data) -> PioneerResult<()> {
        for (path, _) in value.flattened() {
            let index_key = path.repr();
            let mut entry = match self.index.get(&index_key).await {
                Ok(d) => IndexEntry::from_data(&d),
                Err(PioneerError::NotFound(_)) => IndexEntry::default(),
                Err(e) => return Err(e),
            };
            if !entry.references.iter().any(|r| r == key) {
                entry.references.push(key.to_string());
            }
            let data = entry.to_data();
            if self.index.contains(&index_key).await {
                self.index.update(&index_key, &data).await?;
            } else {
                self.index.insert(&index_key, &data).await?;
            }
        }
        Ok(())
    }

    /// Narrows candidates to the union of references for every output
    /// field before evaluating the full query predicate; falls back to a
    /// full scan when the query names no output fields to index by.
    pub async fn query(&self, query: &Query) -> PioneerResult<Vec<Data>> {
        if query.outputs.is_empty() {
            return self.data.query(query).await;
        }
        let mut candidates: HashSet<String> = HashSet::new();
        for output in &query.outputs {
            let refs = match self.index.get(&output.repr()).await {
                Ok(d) => IndexEntry::from_data(&d).references,
                Err(PioneerError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
            candidates.extend(refs);
        }
        let mut out = Vec::new();
        for key in candidates {
            let Ok(record) = self.data.get(&key).await else { continue };
            if let Some(result) = query.evaluate(&record)? {
                out.push(result);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_data::FieldPath;
    use pioneer_storage::MemoryClient;

    async fn indexed() -> IndexedDatabase {
        let data = DatabaseClient::open(MemoryClient::new().await.unwrap(), "docs").await.unwrap();
        let index = DatabaseClient::open(MemoryClient::new().await.unwrap(), "docs_index").await.unwrap();
        IndexedDatabase::new(data, index)
    }

    fn data(json: serde_json::Value) -> Data {
        Data::from_json(json).unwrap()
    }

    #[tokio::test]
    async fn insert_populates_index_entries_per_flattened_path() {
        let db = indexed().await;
        db.insert("alice", &data(serde_json::json!({"name": "Alice"}))).await.unwrap();
        db.insert("bob", &data(serde_json::json!({"name": "Bob"}))).await.unwrap();

        let query = Query::new().select([FieldPath::from(["name"])]);
        let results = db.query(&query).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn query_narrows_by_output_field_and_still_applies_conditions() {
        let db = indexed().await;
        db.insert("alice", &data(serde_json::json!({"name": "Alice", "age": 30}))).await.unwrap();
        db.insert("bob", &data(serde_json::json!({"name": "Bob", "age": 25}))).await.unwrap();

        let query = Query::new()
            .select([FieldPath::from(["age"])])
            .where_op(crate::query::Operation::gt(FieldPath::from(["age"]), pioneer_data::Value::from(26i64)));
        let results = db.query(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get(&FieldPath::from(["name"])), Some(&pioneer_data::Value::from("Alice")));
    }

    #[tokio::test]
    async fn query_without_outputs_falls_back_to_full_scan() {
        let db = indexed().await;
        db.insert("x", &data(serde_json::json!({"a": 1}))).await.unwrap();
        let results = db.query(&Query::new()).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
