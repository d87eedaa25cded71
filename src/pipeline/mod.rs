//! Query pipeline: model fallback generation and the request-level service.

pub mod generation;
pub mod service;

pub use generation::{AttemptFailure, GenerationPipeline, MAX_ROWS};
pub use service::QueryService;
