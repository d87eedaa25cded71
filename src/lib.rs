//! Guarded natural-language to SQL pipeline for the inventory database.
//!
//! Questions (mostly Turkish) pass through an input guard, a response cache,
//! an intent enhancer and a model-fallback generation loop. Every generated
//! statement must clear an allow-list validator before it reaches the
//! database, and only inside a read-only transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use inventory_nlq::{Config, QueryService};
//!
//! let service = QueryService::from_config(&Config::from_env()?)?;
//! let response = service.process_query("kaç monitör var?").await?;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod guard;
pub mod llm;
pub mod otel;
pub mod pipeline;
pub mod sql;
pub mod types;

pub use cache::{CacheStats, ResponseCache};
pub use config::{Config, ModelAttempt};
pub use guard::{sanitize, InputRejection, SanitizedQuery};
pub use llm::QueryEnhancer;
pub use pipeline::{GenerationPipeline, QueryService};
pub use sql::{SqlRejection, SqlValidator, ValidatedSql};
pub use types::{
    NlqError, PipelineFailure, PipelineResult, QueryAnswer, QueryMetadata, QueryResponse, Result,
};
