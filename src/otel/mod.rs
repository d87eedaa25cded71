//! Tracing instrumentation for the query pipeline.
//!
//! Span attributes follow OpenTelemetry semantic conventions so the output
//! can be exported unchanged by a `tracing-opentelemetry` layer:
//! - https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//! - https://opentelemetry.io/docs/specs/semconv/gen-ai/gen-ai-spans/
//!
//! # Database Semantic Conventions
//!
//! **Span naming**: `{db.operation.name} {target}`, e.g. `query items`
//!
//! **Required attributes**:
//! - `db.system.name`: Always `"mysql"`
//!
//! **Recommended**:
//! - `db.query.text`: Validated SQL text
//! - `db.namespace`: Database name
//!
//! # Generation Conventions
//!
//! - `gen_ai.operation.name`: Always `"chat"`
//! - `gen_ai.request.model`, `gen_ai.request.temperature`
//!
//! # Example
//!
//! ```rust,ignore
//! use inventory_nlq::otel::{db_query_span, record_db_metrics};
//!
//! let span = db_query_span(sql.as_str(), Some("ctis_sims"));
//! let rows = executor.fetch_all(&sql).instrument(span.clone()).await?;
//! span.in_scope(|| record_db_metrics(Some(rows.len()), None));
//! ```

pub mod db;
pub mod pipeline;

pub use db::{db_query_span, db_span, record_db_metrics, DbOperation};
pub use pipeline::{attempt_span, llm_span, pipeline_span, PipelineStage};
