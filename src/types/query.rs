//! Query enhancement metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregation function detected in a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregation {
    /// "kaç tane", "how many"
    Count,
    /// "toplam", "total"
    Sum,
    /// "ortalama", "average"
    Avg,
    /// "en fazla", "maximum"
    Max,
    /// "en az", "minimum"
    Min,
}

impl Aggregation {
    /// SQL function name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }

    /// Function template suggested to the generator.
    ///
    /// Only COUNT has a complete form; the others need a field chosen by the model.
    pub fn function(&self) -> &'static str {
        match self {
            Self::Count => "COUNT(*)",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date window detected in a question (`YYYY-MM-DD` bounds, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    /// First day of the window
    pub start_date: String,

    /// Last day of the window
    pub end_date: String,

    /// Human-readable label (e.g. "bu hafta", "Last 3 days")
    pub description: String,
}

/// Aggregation intent detected in a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticalInfo {
    /// Aggregation tag
    pub aggregation: Aggregation,

    /// Function template (e.g. `COUNT(*)`)
    pub function: String,
}

impl From<Aggregation> for StatisticalInfo {
    fn from(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            function: aggregation.function().to_string(),
        }
    }
}

/// Structured intent extracted from a sanitized question.
///
/// Derived deterministically by the query enhancer and consumed by prompt
/// construction. Never mutated after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Whether a date window was detected
    pub has_time_filter: bool,

    /// Detected date window
    pub time_period: Option<TimePeriod>,

    /// Whether an aggregation keyword was detected
    pub has_statistical_intent: bool,

    /// Detected aggregation
    pub statistical_info: Option<StatisticalInfo>,
}

impl QueryMetadata {
    /// Aggregation tag, if any.
    pub fn aggregation(&self) -> Option<Aggregation> {
        self.statistical_info.as_ref().map(|s| s.aggregation)
    }
}
