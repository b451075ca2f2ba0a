//! Thin typings over [`DatabaseClient`] for each named paradigm. Only
//! `NoSQL` and `Parameter` are functional; the others are intentionally
//! inert — named paradigms with no working implementation in this core.

use std::sync::Arc;

use pioneer_core::PioneerResult;
use pioneer_data::{Data, Value};
use pioneer_storage::StorageClient;

use crate::client::DatabaseClient;

/// A plain document store. `NoSqlDatabase` adds no behavior over
/// `DatabaseClient` — it just names the paradigm at the call site.
pub struct NoSqlDatabase(pub DatabaseClient);

impl NoSqlDatabase {
    pub async fn open(backend: Arc<dyn StorageClient>, name: &str) -> PioneerResult<Self> {
        Ok(Self(DatabaseClient::open(backend, name).await?))
    }
}

/// `(value, tags)` pairs, stored as two co-keyed records: the value in
/// this database, the tags in its `tags` sub-namespace.
pub struct ParameterDatabase {
    values: DatabaseClient,
    tags: DatabaseClient,
}

impl ParameterDatabase {
    pub async fn open(backend: Arc<dyn StorageClient>, name: &str) -> PioneerResult<Self> {
        let values = DatabaseClient::open(backend, name).await?;
        let tags = values.namespace("tags").await?;
        Ok(Self { values, tags })
    }

    pub async fn set(&self, key: &str, value: Value, tags: Vec<String>) -> PioneerResult<()> {
        let value_record = Data::from_json(serde_json::json!({ "value": value.to_json() }))
            .expect("a single-field object is always valid Data");
        let tag_record =
            Data::from_json(serde_json::json!({ "tags": tags })).expect("a single-field object is always valid Data");
        write_or_update(&self.values, key, &value_record).await?;
        write_or_update(&self.tags, key, &tag_record).await
    }

    pub async fn get(&self, key: &str) -> PioneerResult<(Value, Vec<String>)> {
        let value_record = self.values.get(key).await?;
        let value = value_record.fields.get("value").cloned().unwrap_or(Value::Null);
        let tags = match self.tags.get(key).await {
            Ok(d) => match d.fields.get("tags") {
                Some(Value::List(items)) => items.iter().filter_map(value_as_string).collect(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        };
        Ok((value, tags))
    }

    pub async fn remove(&self, key: &str) -> PioneerResult<()> {
        self.values.remove(key).await?;
        match self.tags.remove(key).await {
            Ok(()) | Err(pioneer_core::PioneerError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

async fn write_or_update(db: &DatabaseClient, key: &str, record: &Data) -> PioneerResult<()> {
    if db.contains(key).await {
        db.update(key, record).await
    } else {
        db.insert(key, record).await
    }
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

macro_rules! unimplemented_paradigm {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        pub struct $name;

        impl $name {
            pub async fn open(_backend: Arc<dyn StorageClient>, _name: &str) -> anyhow::Result<Self> {
                anyhow::bail!(concat!(stringify!($name), " is not implemented in this core"))
            }
        }
    };
}

unimplemented_paradigm!(RelationalDatabase, "The `Relational` paradigm: not implemented in this core.");
unimplemented_paradigm!(TimeseriesDatabase, "The `Timeseries` paradigm: not implemented in this core.");
unimplemented_paradigm!(GraphDatabase, "The `Graph` paradigm: not implemented in this core.");

#[cfg(test)]
mod tests {
    use super::*;
    use pioneer_storage::MemoryClient;

    #[tokio::test]
    async fn parameter_round_trips_value_and_tags() {
        let db = ParameterDatabase::open(MemoryClient::new().await.unwrap(), "params").await.unwrap();
        db.set("timeout_ms", Value::from(30i64), vec!["network".to_string(), "tunable".to_string()])
            .await
            .unwrap();
        let (value, mut tags) = db.get("timeout_ms").await.unwrap();
        tags.sort();
        assert_eq!(value, Value::from(30i64));
        assert_eq!(tags, vec!["network".to_string(), "tunable".to_string()]);
    }

    #[tokio::test]
    async fn unimplemented_paradigms_fail_to_open() {
        let backend = MemoryClient::new().await.unwrap();
        assert!(RelationalDatabase::open(backend, "r").await.is_err());
    }
}
