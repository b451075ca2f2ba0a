//! The document database (C8): a query-able collection of [`Data`](pioneer_data::Data)
//! records layered over a storage client, plus an optional index wrapper
//! (C8.3) for fields queried often enough to be worth narrowing by.

mod client;
mod config;
mod index;
mod paradigm;
mod query;

pub use client::DatabaseClient;
pub use config::{DatabaseConfig, FunctionConfig, DATABASE_CONFIG_FILE};
pub use index::{IndexEntry, IndexedDatabase};
pub use paradigm::{GraphDatabase, NoSqlDatabase, ParameterDatabase, RelationalDatabase, TimeseriesDatabase};
pub use query::{Condition, Conjunction, ForeignData, Modifier, Operation, Operator, Query, Statement};
