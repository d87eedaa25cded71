//! Inventory database access: read-only execution and schema introspection.

pub mod executor;
pub mod schema;

pub use executor::{classify_error, row_to_json, ColumnInfo, MySqlExecutor, QueryExecutor};
pub use schema::{describe_schema, SchemaCache, SCHEMA_UNAVAILABLE};
