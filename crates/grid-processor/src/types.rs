//! Core types for gridded time series.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use swe_common::BoundingBox;

use crate::error::{GridProcessorError, Result};

/// Cell-centre coordinates of a regular 2-D grid.
///
/// `x` runs along columns, `y` along rows, in the order the data is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl GridGeometry {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.x.len()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.y.len()
    }

    /// (width, height)
    pub fn shape(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute cell size (dx, dy) taken from the first two coordinates of
    /// each axis. `None` if either axis has fewer than two cells.
    pub fn pixel_size(&self) -> Option<(f64, f64)> {
        if self.x.len() < 2 || self.y.len() < 2 {
            return None;
        }
        Some(((self.x[1] - self.x[0]).abs(), (self.y[1] - self.y[0]).abs()))
    }

    /// True when row 0 is the northernmost row.
    pub fn is_north_up(&self) -> bool {
        self.y.len() < 2 || self.y[0] > self.y[self.y.len() - 1]
    }

    /// Outer edges of the grid (cell centres extended by half a cell).
    pub fn bounds(&self) -> Option<BoundingBox> {
        let (dx, dy) = self.pixel_size()?;
        let (min_x, max_x) = min_max(&self.x)?;
        let (min_y, max_y) = min_max(&self.y)?;
        Some(BoundingBox::new(
            min_x - dx / 2.0,
            min_y - dy / 2.0,
            max_x + dx / 2.0,
            max_y + dy / 2.0,
        ))
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// A single 2-D grid of values (row-major, rows in `geometry.y` order).
///
/// Missing cells are `NaN`.
#[derive(Debug, Clone)]
pub struct Grid {
    pub data: Vec<f32>,
    pub geometry: Arc<GridGeometry>,
}

impl Grid {
    /// Create a grid, checking the value count matches the geometry.
    pub fn new(data: Vec<f32>, geometry: Arc<GridGeometry>) -> Result<Self> {
        if data.len() != geometry.len() {
            return Err(GridProcessorError::invalid_metadata(format!(
                "grid has {} values but geometry is {}x{}",
                data.len(),
                geometry.width(),
                geometry.height()
            )));
        }
        Ok(Self { data, geometry })
    }

    /// A grid where every cell holds `value`.
    pub fn filled(value: f32, geometry: Arc<GridGeometry>) -> Self {
        Self {
            data: vec![value; geometry.len()],
            geometry,
        }
    }

    pub fn width(&self) -> usize {
        self.geometry.width()
    }

    pub fn height(&self) -> usize {
        self.geometry.height()
    }

    /// (width, height)
    pub fn shape(&self) -> (usize, usize) {
        self.geometry.shape()
    }

    /// Number of cells holding a finite value.
    pub fn finite_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }
}

/// Loads the values of one timestep of a series on demand.
///
/// Implementations return `width * height` values in row-major order with
/// missing cells already converted to `NaN`.
pub trait TimestepReader: Send + Sync {
    fn read_timestep(&self, index: usize) -> Result<Vec<f32>>;
}

/// A time-indexed series of 2-D grids sharing one geometry.
///
/// Timestamps may be irregular and have gaps. Grids are read lazily through
/// the series' [`TimestepReader`].
pub struct GriddedTimeSeries {
    name: String,
    times: Vec<DateTime<Utc>>,
    index: HashMap<DateTime<Utc>, usize>,
    geometry: Arc<GridGeometry>,
    reader: Box<dyn TimestepReader>,
}

impl GriddedTimeSeries {
    /// Create a series. When a timestamp repeats, lookups resolve to its
    /// first occurrence.
    pub fn new(
        name: impl Into<String>,
        times: Vec<DateTime<Utc>>,
        geometry: GridGeometry,
        reader: Box<dyn TimestepReader>,
    ) -> Self {
        let mut index = HashMap::with_capacity(times.len());
        for (i, t) in times.iter().enumerate() {
            index.entry(*t).or_insert(i);
        }
        Self {
            name: name.into(),
            times,
            index,
            geometry: Arc::new(geometry),
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All timestamps, in storage order.
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn geometry(&self) -> &Arc<GridGeometry> {
        &self.geometry
    }

    /// Spatial shape (width, height) shared by every timestep.
    pub fn shape(&self) -> (usize, usize) {
        self.geometry.shape()
    }

    /// Number of timesteps.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Exact membership test against the time index.
    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.index.contains_key(time)
    }

    /// Read the grid at a timestep index.
    pub fn read_index(&self, index: usize) -> Result<Grid> {
        if index >= self.times.len() {
            return Err(GridProcessorError::read_failed(format!(
                "timestep index {} out of range for {} timesteps",
                index,
                self.times.len()
            )));
        }
        let data = self.reader.read_timestep(index)?;
        Grid::new(data, self.geometry.clone())
    }

    /// Read the grid at an exact timestamp, `None` if the series has no such
    /// timestep.
    pub fn select(&self, time: &DateTime<Utc>) -> Result<Option<Grid>> {
        match self.index.get(time) {
            Some(&i) => self.read_index(i).map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for GriddedTimeSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GriddedTimeSeries")
            .field("name", &self.name)
            .field("timesteps", &self.times.len())
            .field("shape", &self.shape())
            .finish()
    }
}
