//! Database operation instrumentation.
//!
//! Implements OpenTelemetry semantic conventions for MySQL operations.

use tracing::{field, span, Level, Span};

/// Database operation types (maps to `db.operation.name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOperation {
    /// Read-only SELECT produced by the generator
    Query,
    /// INFORMATION_SCHEMA introspection
    Introspect,
}

impl DbOperation {
    /// Get operation name as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Introspect => "introspect",
        }
    }
}

/// Create database operation span with semantic conventions.
///
/// # Arguments
///
/// * `operation` - Database operation type
/// * `namespace` - Database name (optional)
///
/// # Returns
///
/// Tracing span with OpenTelemetry semantic attributes
pub fn db_span(operation: DbOperation, namespace: Option<&str>) -> Span {
    span!(
        Level::INFO,
        "db",
        otel.name = operation.as_str(),
        otel.kind = "client",
        db.system.name = "mysql",
        db.operation.name = operation.as_str(),
        db.namespace = namespace,
        db.response.returned_rows = field::Empty,
    )
}

/// Create database query span for generated SQL.
///
/// # Arguments
///
/// * `query_text` - Validated SQL text
/// * `namespace` - Database name (optional)
///
/// # Returns
///
/// Tracing span with query attributes and empty row-count fields to fill in
/// with [`record_db_metrics`]
///
/// # Example
///
/// ```rust,ignore
/// let span = db_query_span("SELECT COUNT(*) FROM items;", Some("ctis_sims"));
/// let _guard = span.entered();
/// ```
pub fn db_query_span(query_text: &str, namespace: Option<&str>) -> Span {
    span!(
        Level::INFO,
        "db.query",
        otel.name = "query",
        otel.kind = "client",
        db.system.name = "mysql",
        db.operation.name = DbOperation::Query.as_str(),
        db.namespace = namespace,
        db.query.text = query_text,
        db.response.returned_rows = field::Empty,
        db.response.truncated = field::Empty,
    )
}

/// Record database operation metrics in the current span.
///
/// # Arguments
///
/// * `rows_returned` - Number of rows returned (optional)
/// * `truncated` - Whether the result hit the row cap (optional)
///
/// # Example
///
/// ```rust,ignore
/// let span = db_query_span(sql, None);
/// let _guard = span.entered();
///
/// record_db_metrics(Some(rows.len()), Some(false));
/// ```
pub fn record_db_metrics(rows_returned: Option<usize>, truncated: Option<bool>) {
    let span = Span::current();
    if let Some(returned) = rows_returned {
        span.record("db.response.returned_rows", returned);
    }
    if let Some(truncated) = truncated {
        span.record("db.response.truncated", truncated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_operation_names() {
        assert_eq!(DbOperation::Query.as_str(), "query");
        assert_eq!(DbOperation::Introspect.as_str(), "introspect");
    }

    #[test]
    fn test_metrics_outside_span_are_ignored() {
        record_db_metrics(Some(3), Some(false));
    }
}
