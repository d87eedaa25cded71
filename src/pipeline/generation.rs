//! Translate, generate, validate and execute with model fallback.
//!
//! One run walks the configured model sequence. Every failed attempt is
//! recorded; generation and validation failures are fed back to the model on
//! the next attempt so it can avoid repeating them.

use crate::config::ModelAttempt;
use crate::db::{QueryExecutor, SchemaCache};
use crate::llm::morphology::Morphology;
use crate::llm::prompts::generation_messages;
use crate::llm::{ChatBackend, ChatRequest, Translator};
use crate::otel::{attempt_span, pipeline_span, record_db_metrics, PipelineStage};
use crate::sql::{extract_sql, SqlRejection, SqlValidator};
use crate::types::{
    FailureKind, NlqError, PipelineFailure, PipelineResult, QueryAnswer, QueryMetadata, Row,
};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// Maximum rows returned from one query.
pub const MAX_ROWS: usize = 1000;

/// Why one generation attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// Model reply contained no SQL
    EmptySql,
    /// Validator refused the statement
    Rejected(SqlRejection),
    /// Database refused a validated statement
    Execution { sql: String, error: String },
    /// Generation or database backend could not be reached
    Backend(String),
}

impl AttemptFailure {
    /// Backend failures say nothing about the generated SQL.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// Short label recorded as `generation.outcome`.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::EmptySql => "empty_sql",
            Self::Rejected(_) => "rejected",
            Self::Execution { .. } => "execution_error",
            Self::Backend(_) => "backend_unavailable",
        }
    }

    fn from_execution(sql: &str, err: NlqError) -> Self {
        match err {
            NlqError::BackendUnavailable(msg) => Self::Backend(msg),
            other => Self::Execution {
                sql: sql.to_string(),
                error: match other {
                    NlqError::ExecutionError(msg) => msg,
                    other => other.to_string(),
                },
            },
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySql => write!(f, "Empty SQL"),
            Self::Rejected(reason) => write!(f, "Security: {}", reason),
            Self::Execution { sql, error } => write!(f, "SQL: {} -> Error: {}", sql, error),
            Self::Backend(msg) => write!(f, "Backend unavailable: {}", msg),
        }
    }
}

/// Generation pipeline.
pub struct GenerationPipeline {
    backend: Arc<dyn ChatBackend>,
    executor: Arc<dyn QueryExecutor>,
    translator: Translator,
    schema: SchemaCache,
    model_sequence: Vec<ModelAttempt>,
    max_rows: usize,
}

impl GenerationPipeline {
    /// Create new pipeline.
    ///
    /// # Arguments
    ///
    /// * `backend` - Chat backend used for translation and generation
    /// * `executor` - Database executor
    /// * `morphology` - Stemmer for the translation gloss
    /// * `translation_model` - Model identifier for translation
    /// * `model_sequence` - Ordered generation fallback sequence
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        executor: Arc<dyn QueryExecutor>,
        morphology: Arc<dyn Morphology>,
        translation_model: impl Into<String>,
        model_sequence: Vec<ModelAttempt>,
    ) -> Self {
        let translator = Translator::new(backend.clone(), morphology, translation_model);
        Self {
            backend,
            executor,
            translator,
            schema: SchemaCache::new(),
            model_sequence,
            max_rows: MAX_ROWS,
        }
    }

    /// Override the row cap.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Configured fallback sequence.
    pub fn model_sequence(&self) -> &[ModelAttempt] {
        &self.model_sequence
    }

    /// Run the pipeline for one query.
    ///
    /// # Arguments
    ///
    /// * `query` - Sanitized, annotated query text
    /// * `metadata` - Enhancement metadata driving prompt rules
    ///
    /// # Returns
    ///
    /// Rows from the first attempt that validated and executed, or the
    /// ordered failure history
    pub async fn run(&self, query: &str, metadata: &QueryMetadata) -> PipelineResult {
        let translated = match self
            .translator
            .translate(query)
            .instrument(pipeline_span(PipelineStage::Translate))
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                error!(error = %e, "Translation failed");
                return PipelineResult::Failure(PipelineFailure::new(
                    FailureKind::TranslationFailed,
                    vec![e.to_string()],
                ));
            }
        };

        self.generate(query, translated, metadata)
            .instrument(pipeline_span(PipelineStage::Generate))
            .await
    }

    async fn generate(
        &self,
        query: &str,
        translated: String,
        metadata: &QueryMetadata,
    ) -> PipelineResult {
        let schema = self.schema.describe(self.executor.as_ref()).await;
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for model in &self.model_sequence {
            for attempt in 1..=model.retry_count {
                let span = attempt_span(&model.name, attempt);
                let outcome = self
                    .attempt(model, &schema, &translated, metadata, &failures)
                    .instrument(span.clone())
                    .await;
                span.record(
                    "generation.outcome",
                    outcome.as_ref().map_or_else(AttemptFailure::outcome, |_| "success"),
                );

                match outcome {
                    Ok((sql, rows)) => {
                        let (rows, truncated) = self.cap_rows(rows);
                        info!(model = %model.name, attempt, rows = rows.len(), "Query answered");
                        return PipelineResult::Success(QueryAnswer {
                            original_query: query.to_string(),
                            translated_query: translated,
                            sql,
                            row_count: rows.len(),
                            rows,
                            model: model.name.clone(),
                            truncated,
                            attempt_errors: failures.iter().map(ToString::to_string).collect(),
                        });
                    }
                    Err(failure) => {
                        warn!(model = %model.name, attempt, failure = %failure, "Attempt failed");
                        failures.push(failure);
                    }
                }
            }
        }

        let kind = if !failures.is_empty() && failures.iter().all(AttemptFailure::is_backend) {
            FailureKind::BackendUnavailable
        } else {
            FailureKind::GenerationExhausted
        };
        error!(attempts = failures.len(), ?kind, "All generation attempts failed");

        PipelineResult::Failure(PipelineFailure::new(
            kind,
            failures.iter().map(ToString::to_string).collect(),
        ))
    }

    /// One generate, validate, execute cycle.
    async fn attempt(
        &self,
        model: &ModelAttempt,
        schema: &str,
        question: &str,
        metadata: &QueryMetadata,
        failures: &[AttemptFailure],
    ) -> std::result::Result<(String, Vec<Row>), AttemptFailure> {
        // Backend outages carry no information about the SQL itself
        let history: Vec<String> = failures
            .iter()
            .filter(|f| !f.is_backend())
            .map(ToString::to_string)
            .collect();

        let request = ChatRequest {
            model: model.model_identifier.clone(),
            messages: generation_messages(schema, question, metadata, &history),
            temperature: model.temperature,
        };

        let reply = self.backend.chat(&request).await.map_err(|e| match e {
            NlqError::BackendUnavailable(msg) => AttemptFailure::Backend(msg),
            other => AttemptFailure::Backend(other.to_string()),
        })?;

        let candidate = extract_sql(&reply).ok_or(AttemptFailure::EmptySql)?;
        info!(sql = %candidate, "Generated SQL");

        let validated = SqlValidator::validate(&candidate).map_err(AttemptFailure::Rejected)?;

        let rows = self
            .executor
            .fetch_all(&validated)
            .await
            .map_err(|e| AttemptFailure::from_execution(validated.as_str(), e))?;

        Ok((validated.into_inner(), rows))
    }

    fn cap_rows(&self, mut rows: Vec<Row>) -> (Vec<Row>, bool) {
        if rows.len() > self.max_rows {
            warn!(
                rows = rows.len(),
                max = self.max_rows,
                "Query returned too many rows, truncating"
            );
            rows.truncate(self.max_rows);
            record_db_metrics(None, Some(true));
            (rows, true)
        } else {
            (rows, false)
        }
    }
}
