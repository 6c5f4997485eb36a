use thiserror::Error;

/// Raised by the range binner when asked for an empty or degenerate bucket range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid range: min={min}, max={max}, interval={interval} ({reason})")]
pub struct InvalidRangeError {
    pub min: f64,
    pub max: f64,
    pub interval: f64,
    pub reason: &'static str,
}

/// Errors surfaced by the analysis engine and its session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Malformed filter, reported before any fetch or aggregation
    #[error("invalid filter: {0}")]
    Validation(String),

    /// The query succeeded but returned no rows
    #[error("no transactions matched the query")]
    EmptyResult,

    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),

    /// Storage or share service failure; retryable
    #[error("upstream service failed: {0}")]
    Upstream(String),

    #[error("invalid settings: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::Upstream(_))
    }
}
