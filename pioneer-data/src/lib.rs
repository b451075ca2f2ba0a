//! The structural, mergeable data model: field-path access, flatten/inflate
//! round trips, and JSON-Schema-style merge strategies.

mod model;
mod path;
mod schema;
mod value;

pub use model::Data;
pub use path::{FieldKey, FieldPath};
pub use schema::{MergeStrategy, Schema};
pub use value::Value;
