//! In-memory dataset accessor, used by tests and local runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use swe_common::BoundingBox;

use crate::error::{GridProcessorError, Result};
use crate::types::{GridGeometry, GriddedTimeSeries, TimestepReader};

use super::{select_range, DatasetAccessor, SourceDescriptor};

/// Timesteps held in memory, one row-major vector per timestep.
#[derive(Debug, Clone)]
pub struct InMemoryTimesteps {
    steps: Arc<Vec<Vec<f32>>>,
}

impl InMemoryTimesteps {
    pub fn new(steps: Vec<Vec<f32>>) -> Self {
        Self {
            steps: Arc::new(steps),
        }
    }
}

impl TimestepReader for InMemoryTimesteps {
    fn read_timestep(&self, index: usize) -> Result<Vec<f32>> {
        self.steps.get(index).cloned().ok_or_else(|| {
            GridProcessorError::read_failed(format!("no in-memory timestep {}", index))
        })
    }
}

/// Timesteps clipped to a column/row window of a larger in-memory grid.
struct WindowedTimesteps {
    steps: Arc<Vec<Vec<f32>>>,
    full_width: usize,
    cols: std::ops::Range<usize>,
    rows: std::ops::Range<usize>,
}

impl TimestepReader for WindowedTimesteps {
    fn read_timestep(&self, index: usize) -> Result<Vec<f32>> {
        let step = self.steps.get(index).ok_or_else(|| {
            GridProcessorError::read_failed(format!("no in-memory timestep {}", index))
        })?;
        let mut out = Vec::with_capacity(self.cols.len() * self.rows.len());
        for row in self.rows.clone() {
            let start = row * self.full_width;
            out.extend_from_slice(&step[start + self.cols.start..start + self.cols.end]);
        }
        Ok(out)
    }
}

/// A [`DatasetAccessor`] serving a fixed series regardless of the source.
///
/// The bounding box is honoured the same way the Zarr accessor honours it.
#[derive(Debug, Clone)]
pub struct InMemoryAccessor {
    times: Vec<DateTime<Utc>>,
    geometry: GridGeometry,
    steps: Arc<Vec<Vec<f32>>>,
    failure: Option<String>,
}

impl InMemoryAccessor {
    pub fn new(times: Vec<DateTime<Utc>>, geometry: GridGeometry, steps: Vec<Vec<f32>>) -> Self {
        Self {
            times,
            geometry,
            steps: Arc::new(steps),
            failure: None,
        }
    }

    /// An accessor whose every fetch fails as if the store were unreachable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            times: Vec::new(),
            geometry: GridGeometry::new(Vec::new(), Vec::new()),
            steps: Arc::new(Vec::new()),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl DatasetAccessor for InMemoryAccessor {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        bbox: &BoundingBox,
    ) -> Result<GriddedTimeSeries> {
        if let Some(message) = &self.failure {
            return Err(GridProcessorError::open_failed(message.clone()));
        }

        let cols = select_range(&self.geometry.x, bbox.min_x, bbox.max_x).ok_or_else(|| {
            GridProcessorError::EmptySelection {
                axis: source.dimensions.x.clone(),
                min: bbox.min_x,
                max: bbox.max_x,
            }
        })?;
        let rows = select_range(&self.geometry.y, bbox.min_y, bbox.max_y).ok_or_else(|| {
            GridProcessorError::EmptySelection {
                axis: source.dimensions.y.clone(),
                min: bbox.min_y,
                max: bbox.max_y,
            }
        })?;

        let geometry = GridGeometry::new(
            self.geometry.x[cols.clone()].to_vec(),
            self.geometry.y[rows.clone()].to_vec(),
        );
        let reader = WindowedTimesteps {
            steps: self.steps.clone(),
            full_width: self.geometry.width(),
            cols,
            rows,
        };

        Ok(GriddedTimeSeries::new(
            format!("memory/{}", source.variable),
            self.times.clone(),
            geometry,
            Box::new(reader),
        ))
    }
}
