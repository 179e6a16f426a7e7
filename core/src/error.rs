//! Error types for logbook operations.
//!
//! Validation problems, odometer regressions and distance lookup failures are
//! distinct variants so callers can surface each one differently. Storage
//! and serialization failures are flattened to strings at this boundary.

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogbookError>;

#[derive(Debug, Error)]
pub enum LogbookError {
    /// Malformed input: bad plate, missing field, bad date or time.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A reading dated at or after the latest one reports a lower odometer.
    #[error(
        "Odometer reading {attempted_odometer} km on {attempted_date} is lower than the previous reading {latest_odometer} km from {latest_date}. The odometer cannot go backwards"
    )]
    OdometerRegression {
        attempted_odometer: u64,
        attempted_date: NaiveDate,
        latest_odometer: u64,
        latest_date: NaiveDate,
    },

    /// The distance lookup failed; nothing was saved.
    #[error("Could not calculate distance: {0}")]
    DistanceResolution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl From<rusqlite::Error> for LogbookError {
    fn from(err: rusqlite::Error) -> Self {
        LogbookError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for LogbookError {
    fn from(err: std::io::Error) -> Self {
        LogbookError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LogbookError {
    fn from(err: serde_json::Error) -> Self {
        LogbookError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for LogbookError {
    fn from(err: csv::Error) -> Self {
        LogbookError::Export(err.to_string())
    }
}
