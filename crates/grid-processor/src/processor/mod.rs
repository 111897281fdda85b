//! Dataset accessor trait and implementations.

mod memory;
mod zarr;

pub use memory::{InMemoryAccessor, InMemoryTimesteps};
pub use zarr::{open_zarr_series, select_range, ZarrDatasetAccessor, ZarrTimestepReader};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swe_common::BoundingBox;

use crate::error::Result;
use crate::types::GriddedTimeSeries;

/// Names of the dimensions (and coordinate arrays) of a data variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionNames {
    pub time: String,
    pub y: String,
    pub x: String,
}

impl Default for DimensionNames {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            y: "y".to_string(),
            x: "x".to_string(),
        }
    }
}

/// Where a gridded dataset lives and how to authenticate against it.
#[derive(Clone)]
pub struct SourceDescriptor {
    /// Storage account endpoint root.
    pub endpoint: String,
    /// Container holding the dataset.
    pub container: String,
    /// Key prefix of the Zarr store inside the container.
    pub prefix: String,
    /// Name of the data variable inside the store.
    pub variable: String,
    /// Time-limited access token; `None` when not configured.
    pub credential: Option<String>,
    pub dimensions: DimensionNames,
}

impl SourceDescriptor {
    /// Human-readable location used in logs (never includes the credential).
    pub fn location(&self) -> String {
        format!(
            "{}/{}/{}#{}",
            self.endpoint.trim_end_matches('/'),
            self.container,
            self.prefix.trim_matches('/'),
            self.variable
        )
    }
}

impl std::fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("endpoint", &self.endpoint)
            .field("container", &self.container)
            .field("prefix", &self.prefix)
            .field("variable", &self.variable)
            .field(
                "credential",
                &self.credential.as_ref().map(|_| "<redacted>"),
            )
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Opens a remote gridded dataset as a time series clipped to a box.
///
/// Implementations select the descriptor's variable and subset it with
/// independent, inclusive x and y range selections. Failures to reach or
/// authenticate against the store are returned as errors; there is no retry.
#[async_trait]
pub trait DatasetAccessor: Send + Sync {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        bbox: &BoundingBox,
    ) -> Result<GriddedTimeSeries>;
}
