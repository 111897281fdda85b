//! Raster output.

mod geotiff;

pub use geotiff::GeoTiffWriter;

use std::path::Path;

use swe_common::CrsCode;

use crate::error::Result;
use crate::types::Grid;

/// Serializes a georeferenced grid to a file, creating or overwriting it.
pub trait RasterSink: Send + Sync {
    fn write(&self, grid: &Grid, crs: CrsCode, path: &Path) -> Result<()>;
}
