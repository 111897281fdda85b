//! Error types for grid processing.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use swe_common::SweError;
use thiserror::Error;

/// Errors that can occur while reading, reducing or writing grids.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Failed to open the grid data source.
    #[error("failed to open grid: {0}")]
    OpenFailed(String),

    /// No credential was configured for the data source.
    #[error("no access credential configured for {0}")]
    MissingCredential(String),

    /// Failed to read data from the grid.
    #[error("failed to read grid data: {0}")]
    ReadFailed(String),

    /// Invalid metadata in the dataset.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// The bounding box selects no cells along an axis.
    #[error("bounding box selects no cells along {axis} (range {min}..={max})")]
    EmptySelection { axis: String, min: f64, max: f64 },

    /// Two grids that must align do not.
    #[error("grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The series has no timestep at the requested timestamp.
    #[error("no timestep at {0}")]
    MissingTimestep(DateTime<Utc>),

    /// None of the historical anchors are present in the series.
    #[error("no historical anchors present for {year}-{month:02}")]
    NoHistoricalAnchors { year: i32, month: u32 },

    /// Failed to write an output raster.
    #[error("failed to write {}: {message}", path.display())]
    WriteFailed { path: PathBuf, message: String },
}

impl GridProcessorError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a WriteFailed error.
    pub fn write_failed(path: impl Into<PathBuf>, msg: impl ToString) -> Self {
        Self::WriteFailed {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Map onto the pipeline error taxonomy for the named dataset family.
    pub fn into_swe(self, dataset: &str) -> SweError {
        let dataset = dataset.to_string();
        match self {
            Self::MissingTimestep(timestamp) => SweError::MissingTargetPeriod { dataset, timestamp },
            Self::NoHistoricalAnchors { year, month } => {
                SweError::UndefinedNormal { dataset, year, month }
            }
            Self::WriteFailed { path, message } => SweError::RasterWriteFailure { path, message },
            other @ (Self::OpenFailed(_)
            | Self::MissingCredential(_)
            | Self::ReadFailed(_)
            | Self::InvalidMetadata(_)
            | Self::EmptySelection { .. }
            | Self::ShapeMismatch { .. }) => SweError::DataSourceUnavailable {
                dataset,
                message: other.to_string(),
            },
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
