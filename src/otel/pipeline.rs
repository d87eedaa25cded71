//! Pipeline and generation-call instrumentation.

use tracing::{field, span, Level, Span};

/// Pipeline stages (maps to `pipeline.stage`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Input guard
    Sanitize,
    /// Time and aggregation detection
    Enhance,
    /// Query translation to English
    Translate,
    /// SQL generation, validation and execution
    Generate,
}

impl PipelineStage {
    /// Get stage name as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sanitize => "sanitize",
            Self::Enhance => "enhance",
            Self::Translate => "translate",
            Self::Generate => "generate",
        }
    }
}

/// Create the top-level span for one request.
///
/// `cached` and `outcome` start empty and are recorded once known.
/// `db.response.truncated` is set when the answer was cut to the row cap.
pub fn pipeline_span(stage: PipelineStage) -> Span {
    span!(
        Level::INFO,
        "pipeline",
        otel.name = %format!("pipeline {}", stage.as_str()),
        otel.kind = "internal",
        pipeline.stage = stage.as_str(),
        pipeline.cached = field::Empty,
        pipeline.outcome = field::Empty,
        db.response.truncated = field::Empty,
    )
}

/// Create span for a single model attempt within the fallback sequence.
///
/// # Arguments
///
/// * `name` - Attempt name from the model sequence (e.g. "Primary")
/// * `attempt` - 1-based attempt number for this entry
pub fn attempt_span(name: &str, attempt: u32) -> Span {
    span!(
        Level::INFO,
        "generation.attempt",
        otel.name = %format!("attempt {} #{}", name, attempt),
        otel.kind = "internal",
        generation.model_name = name,
        generation.attempt = attempt,
        generation.outcome = field::Empty,
    )
}

/// Create span for a chat call to the generation backend.
///
/// # Arguments
///
/// * `model` - Model identifier sent to the backend
/// * `temperature` - Sampling temperature
///
/// # Returns
///
/// Client span with `gen_ai.*` attributes
pub fn llm_span(model: &str, temperature: f32) -> Span {
    span!(
        Level::INFO,
        "gen_ai.chat",
        otel.name = %format!("chat {}", model),
        otel.kind = "client",
        gen_ai.operation.name = "chat",
        gen_ai.system = "ollama",
        gen_ai.request.model = model,
        gen_ai.request.temperature = temperature as f64,
        gen_ai.response.length = field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Sanitize.as_str(), "sanitize");
        assert_eq!(PipelineStage::Enhance.as_str(), "enhance");
        assert_eq!(PipelineStage::Generate.as_str(), "generate");
    }

    #[test]
    fn test_spans_can_be_entered_and_recorded() {
        let span = pipeline_span(PipelineStage::Generate);
        let _guard = span.enter();
        span.record("pipeline.cached", false);

        let llm = llm_span("llama3.2:latest", 0.1);
        llm.record("gen_ai.response.length", 42usize);
        let attempt = attempt_span("Primary", 1);
        attempt.record("generation.outcome", "success");
    }
}
