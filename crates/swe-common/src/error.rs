//! Error taxonomy for the percent-of-normal pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::time::TargetParseError;

/// Result type alias using SweError.
pub type SweResult<T> = Result<T, SweError>;

/// Pipeline-level failures, one per stage.
///
/// Everything except `InvalidInput` and `InvalidConfig` is scoped to a single
/// dataset family and aborts only that family's branch.
#[derive(Debug, Error)]
pub enum SweError {
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("[{dataset}] data source unavailable: {message}")]
    DataSourceUnavailable { dataset: String, message: String },

    #[error("[{dataset}] no grid for target period at {timestamp}")]
    MissingTargetPeriod {
        dataset: String,
        timestamp: DateTime<Utc>,
    },

    #[error("[{dataset}] no historical anchors for {year}-{month:02}; normal is undefined")]
    UndefinedNormal {
        dataset: String,
        year: i32,
        month: u32,
    },

    #[error("Failed to write raster {}: {message}", path.display())]
    RasterWriteFailure { path: PathBuf, message: String },
}

impl SweError {
    /// Short stable name for the error kind (used in logs).
    pub fn kind(&self) -> &'static str {
        match self {
            SweError::InvalidInput { .. } => "InvalidInput",
            SweError::InvalidConfig(_) => "InvalidConfig",
            SweError::DataSourceUnavailable { .. } => "DataSourceUnavailable",
            SweError::MissingTargetPeriod { .. } => "MissingTargetPeriod",
            SweError::UndefinedNormal { .. } => "UndefinedNormal",
            SweError::RasterWriteFailure { .. } => "RasterWriteFailure",
        }
    }
}

impl From<TargetParseError> for SweError {
    fn from(err: TargetParseError) -> Self {
        SweError::InvalidInput {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}
