//! Core data types for the query pipeline.
//!
//! Defines fundamental types used throughout the system:
//! - `QueryMetadata`: Time window and aggregation intent
//! - `PipelineResult`: Success rows or ordered failure history
//! - `NlqError`: Error types for all operations
//! - `Result`: Convenient result type alias

pub mod error;
pub mod query;
pub mod result;

pub use error::{NlqError, Result, GENERIC_FAILURE_MESSAGE, REJECTED_INPUT_MESSAGE};
pub use query::{Aggregation, QueryMetadata, StatisticalInfo, TimePeriod};
pub use result::{FailureKind, PipelineFailure, PipelineResult, QueryAnswer, QueryResponse, Row};
