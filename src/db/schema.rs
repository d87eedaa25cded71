//! Schema description for the generation prompt.

use crate::db::executor::{ColumnInfo, QueryExecutor};
use crate::types::NlqError;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Placeholder used when the schema cannot be read.
pub const SCHEMA_UNAVAILABLE: &str = "Schema unavailable";

/// Render columns as one `Table 't': col (type), ...` line per table.
///
/// Tables keep the order of their first column; columns keep input order.
///
/// # Examples
///
/// ```
/// use inventory_nlq::db::{describe_schema, ColumnInfo};
///
/// let columns = vec![
///     ColumnInfo::new("items", "id", "int"),
///     ColumnInfo::new("items", "item_name", "varchar"),
///     ColumnInfo::new("roles", "id", "int"),
/// ];
/// assert_eq!(
///     describe_schema(&columns),
///     "Table 'items': id (int), item_name (varchar)\nTable 'roles': id (int)"
/// );
/// ```
pub fn describe_schema(columns: &[ColumnInfo]) -> String {
    let mut tables: Vec<(&str, Vec<String>)> = Vec::new();
    for column in columns {
        let entry = format!("{} ({})", column.column_name, column.data_type);
        match tables.iter_mut().find(|(name, _)| *name == column.table_name) {
            Some((_, cols)) => cols.push(entry),
            None => tables.push((column.table_name.as_str(), vec![entry])),
        }
    }

    tables
        .into_iter()
        .map(|(name, cols)| format!("Table '{}': {}", name, cols.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Process-wide schema description, computed once.
///
/// A failed or empty introspection is not stored, so the next request
/// retries it.
#[derive(Debug, Default)]
pub struct SchemaCache {
    cell: OnceCell<String>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema description, loading it on first successful call.
    ///
    /// # Returns
    ///
    /// The description, or [`SCHEMA_UNAVAILABLE`] if introspection failed
    pub async fn describe(&self, executor: &dyn QueryExecutor) -> String {
        let loaded = self
            .cell
            .get_or_try_init(|| async {
                let columns = executor.schema_columns().await?;
                if columns.is_empty() {
                    return Err(NlqError::execution("no columns visible in schema"));
                }
                info!(columns = columns.len(), "Schema loaded");
                Ok(describe_schema(&columns))
            })
            .await;

        match loaded {
            Ok(schema) => schema.clone(),
            Err(e) => {
                warn!(error = %e, "Schema unavailable");
                SCHEMA_UNAVAILABLE.to_string()
            }
        }
    }

    /// Check if a description has been stored.
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}
