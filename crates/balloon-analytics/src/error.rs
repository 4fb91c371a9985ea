//! Analytics error types.

use thiserror::Error;

/// Analytics errors.
///
/// Analyses themselves never fail on empty or sparse data; these only come
/// from caller mistakes.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Requested hour is not in the series
    #[error("Hour {hour} out of range (series has {available} snapshots)")]
    HourOutOfRange {
        /// Requested hour offset
        hour: usize,
        /// Snapshots in the series
        available: usize,
    },

    /// Report serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
