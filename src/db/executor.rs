//! Read-only execution of validated SQL against MySQL.

use crate::config::DatabaseConfig;
use crate::otel::{db_query_span, db_span, record_db_metrics, DbOperation};
use crate::sql::ValidatedSql;
use crate::types::{NlqError, Result, Row};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Decode, Executor as _, MySql, Row as _, Type, TypeInfo};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn, Instrument};

/// One `INFORMATION_SCHEMA.COLUMNS` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Database seam for the generation pipeline.
///
/// Only [`ValidatedSql`] can be executed; raw model output has no path here.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a validated statement and return all rows as JSON objects.
    ///
    /// # Errors
    ///
    /// - `NlqError::ExecutionError` if the database refused the statement
    /// - `NlqError::BackendUnavailable` if no connection could be used
    async fn fetch_all(&self, sql: &ValidatedSql) -> Result<Vec<Row>>;

    /// Column listing of the configured database, ordered by table then
    /// column position.
    async fn schema_columns(&self) -> Result<Vec<ColumnInfo>>;
}

const SCHEMA_QUERY: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
     CAST(COLUMN_NAME AS CHAR) AS column_name, \
     CAST(DATA_TYPE AS CHAR) AS data_type \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = ? \
     ORDER BY TABLE_NAME, ORDINAL_POSITION";

/// Map a driver error onto the pipeline taxonomy.
///
/// Errors reported by the server are statement problems the model can fix;
/// everything else means the database could not be used at all.
pub fn classify_error(err: sqlx::Error) -> NlqError {
    match err {
        sqlx::Error::Database(db) => NlqError::execution(db.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::RowNotFound => NlqError::execution(err.to_string()),
        other => NlqError::backend(format!("Database unavailable: {}", other)),
    }
}

/// MySQL executor over a connection pool.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
    database: String,
    query_timeout: Duration,
}

impl MySqlExecutor {
    fn pool_options(config: &DatabaseConfig) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
    }

    /// Create the pool without connecting; connections open on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = Self::pool_options(config).connect_lazy_with(config.connect_options());
        Self::from_pool(pool, config)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: MySqlPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            database: config.name.clone(),
            query_timeout: config.query_timeout(),
        }
    }

    /// Borrow the pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Run one statement inside a read-only transaction that is always rolled back.
    async fn run_read_only(
        conn: &mut PoolConnection<MySql>,
        sql: &str,
    ) -> std::result::Result<Vec<MySqlRow>, sqlx::Error> {
        (&mut **conn)
            .execute(sqlx::raw_sql("START TRANSACTION READ ONLY"))
            .await?;

        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut **conn)
            .await;

        if let Err(e) = (&mut **conn).execute(sqlx::raw_sql("ROLLBACK")).await {
            warn!(error = %e, "Rollback failed, discarding connection");
            conn.close_on_drop();
        }
        rows
    }
}

/// Await `fut` for at most `limit`.
///
/// Expiry drops `fut` and surfaces as an execution error, which the
/// generation loop feeds back to the model like any other database error.
async fn bounded<F: Future>(limit: Duration, fut: F) -> Result<F::Output> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!(timeout_secs = limit.as_secs(), "Query timed out");
        NlqError::execution(format!("Query timed out after {}s", limit.as_secs()))
    })
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn fetch_all(&self, sql: &ValidatedSql) -> Result<Vec<Row>> {
        let span = db_query_span(sql.as_str(), Some(&self.database));
        async {
            // Prepared statements take a single statement without terminator
            let statement = sql.as_str().trim_end().trim_end_matches(';');

            let mut conn = self.pool.acquire().await.map_err(classify_error)?;
            let outcome =
                bounded(self.query_timeout, Self::run_read_only(&mut conn, statement)).await;
            let rows = match outcome {
                Ok(rows) => rows.map_err(|e| {
                    error!(error = %e, "DB Error");
                    classify_error(e)
                })?,
                Err(timed_out) => {
                    // Mid-transaction; must not go back to the pool
                    conn.close_on_drop();
                    return Err(timed_out);
                }
            };

            let rows: Vec<Row> = rows.iter().map(row_to_json).collect();
            record_db_metrics(Some(rows.len()), None);
            Ok(rows)
        }
        .instrument(span)
        .await
    }

    async fn schema_columns(&self) -> Result<Vec<ColumnInfo>> {
        let query = sqlx::query(SCHEMA_QUERY)
            .bind(&self.database)
            .fetch_all(&self.pool);
        let rows = bounded(self.query_timeout, query)
            .instrument(db_span(DbOperation::Introspect, Some(&self.database)))
            .await?
            .map_err(classify_error)?;

        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    table_name: row.try_get("table_name")?,
                    column_name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(classify_error)
    }
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize) -> Option<T>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

/// Convert a MySQL row to a JSON object keyed by column name.
///
/// Unknown or undecodable values become `null` rather than failing the row.
pub fn row_to_json(row: &MySqlRow) -> Row {
    let mut map = Row::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();

        let value: Option<JsonValue> = match type_name {
            "NULL" => None,
            "BOOLEAN" => get::<bool>(row, idx).map(JsonValue::from),
            name if name.ends_with("UNSIGNED") => get::<u64>(row, idx).map(JsonValue::from),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                get::<i64>(row, idx).map(JsonValue::from)
            }
            "FLOAT" => get::<f32>(row, idx).map(|f| JsonValue::from(f64::from(f))),
            "DOUBLE" => get::<f64>(row, idx).map(JsonValue::from),
            "DECIMAL" => get::<rust_decimal::Decimal>(row, idx).map(|d| {
                d.to_f64()
                    .map(JsonValue::from)
                    .unwrap_or_else(|| JsonValue::String(d.to_string()))
            }),
            "DATE" => get::<chrono::NaiveDate>(row, idx).map(|d| JsonValue::String(d.to_string())),
            "DATETIME" | "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, idx)
                .map(|dt| JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
            "TIME" => get::<chrono::NaiveTime>(row, idx).map(|t| JsonValue::String(t.to_string())),
            "JSON" => get::<JsonValue>(row, idx),
            _ => get::<String>(row, idx).map(JsonValue::String).or_else(|| {
                get::<Vec<u8>>(row, idx)
                    .map(|bytes| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()))
            }),
        };

        map.insert(column.name().to_string(), value.unwrap_or(JsonValue::Null));
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_backend_unavailable() {
        let err = classify_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, NlqError::BackendUnavailable(_)));

        let err = classify_error(sqlx::Error::PoolClosed);
        assert!(matches!(err, NlqError::BackendUnavailable(_)));
    }

    #[test]
    fn test_row_errors_are_execution_errors() {
        let err = classify_error(sqlx::Error::ColumnNotFound("total".into()));
        assert!(matches!(err, NlqError::ExecutionError(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let config = DatabaseConfig {
            host: "127.0.0.1".into(),
            port: 9,
            ..DatabaseConfig::default()
        };
        let executor = MySqlExecutor::connect_lazy(&config);
        assert_eq!(executor.pool().size(), 0);
    }

    #[tokio::test]
    async fn test_lazy_pool_accepts_any_password() {
        let config = DatabaseConfig {
            host: "127.0.0.1".into(),
            port: 9,
            password: "p@ss#w/rd%".into(),
            ..DatabaseConfig::default()
        };
        let executor = MySqlExecutor::connect_lazy(&config);
        assert_eq!(executor.pool().size(), 0);
        assert_eq!(executor.pool().connect_options().get_host(), "127.0.0.1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_times_out_as_execution_error() {
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let err = bounded(Duration::from_secs(30), slow).await.unwrap_err();
        assert_eq!(err.to_string(), "Query execution failed: Query timed out after 30s");
        assert!(err.is_recoverable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_query_passes_through() {
        let fast = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        };
        assert_eq!(bounded(Duration::from_secs(30), fast).await.unwrap(), 42);
    }
}
