//! Pipeline outcomes.

use crate::types::error::GENERIC_FAILURE_MESSAGE;
use crate::types::query::QueryMetadata;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One result row, column name to JSON value.
pub type Row = Map<String, JsonValue>;

/// Successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// Query text handed to the pipeline (sanitized and annotated)
    pub original_query: String,

    /// English translation used for generation
    pub translated_query: String,

    /// Validated SQL that produced the rows
    pub sql: String,

    /// Result rows (at most the configured row cap)
    pub rows: Vec<Row>,

    /// Number of rows returned
    pub row_count: usize,

    /// Name of the model attempt that succeeded
    pub model: String,

    /// Whether the result set was cut at the row cap
    #[serde(default)]
    pub truncated: bool,

    /// Failures from earlier attempts in the same run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempt_errors: Vec<String>,
}

/// Why a pipeline run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Translation model returned nothing usable
    TranslationFailed,
    /// Every attempt failed generation, validation, or execution
    GenerationExhausted,
    /// Every attempt failed because the generation backend was unreachable
    BackendUnavailable,
}

/// Failed pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// Failure classification
    pub kind: FailureKind,

    /// Generic message safe to show end users
    pub error: String,

    /// Ordered failure history (internal detail, never shown verbatim)
    pub attempt_errors: Vec<String>,
}

impl PipelineFailure {
    /// Create failure with the generic user message.
    pub fn new(kind: FailureKind, attempt_errors: Vec<String>) -> Self {
        Self {
            kind,
            error: GENERIC_FAILURE_MESSAGE.to_string(),
            attempt_errors,
        }
    }
}

/// Outcome of the generation pipeline; the unit cached and returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineResult {
    /// Rows were produced
    Success(QueryAnswer),
    /// Translation failed or all attempts were exhausted
    Failure(PipelineFailure),
}

impl PipelineResult {
    /// Check for success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Borrow the answer on success.
    pub fn answer(&self) -> Option<&QueryAnswer> {
        match self {
            Self::Success(answer) => Some(answer),
            Self::Failure(_) => None,
        }
    }

    /// Borrow the failure.
    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Response returned by `QueryService::process_query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Pipeline outcome
    #[serde(flatten)]
    pub result: PipelineResult,

    /// Enhancement metadata (time window, aggregation)
    pub query_enhancement: QueryMetadata,

    /// Whether the result came from the response cache
    pub cached: bool,
}
