//! Single-band Float32 GeoTIFF writer.
//!
//! Uses the pure Rust `tiff` crate. Georeferencing is written as the three
//! standard GeoTIFF tags (pixel scale, tiepoint, key directory) plus the GDAL
//! no-data tag, so GDAL and QGIS read the raster without sidecar files.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use swe_common::CrsCode;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::error::{GridProcessorError, Result};
use crate::types::Grid;

use super::RasterSink;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
const GDAL_NODATA_TAG: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Writes grids as north-up GeoTIFFs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffWriter;

impl GeoTiffWriter {
    pub fn new() -> Self {
        Self
    }
}

impl RasterSink for GeoTiffWriter {
    fn write(&self, grid: &Grid, crs: CrsCode, path: &Path) -> Result<()> {
        let geometry = &grid.geometry;
        let (dx, dy) = geometry.pixel_size().ok_or_else(|| {
            GridProcessorError::write_failed(
                path,
                format!(
                    "cannot georeference a {}x{} grid",
                    geometry.width(),
                    geometry.height()
                ),
            )
        })?;
        let bounds = geometry
            .bounds()
            .ok_or_else(|| GridProcessorError::write_failed(path, "grid has no extent"))?;

        let data = oriented_pixels(grid);
        let width = grid.width() as u32;
        let height = grid.height() as u32;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| GridProcessorError::write_failed(path, e))?;
        }

        let file = File::create(path).map_err(|e| GridProcessorError::write_failed(path, e))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))
            .map_err(|e| GridProcessorError::write_failed(path, e))?;
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(width, height)
            .map_err(|e| GridProcessorError::write_failed(path, e))?;

        let tiepoint = [0.0, 0.0, 0.0, bounds.min_x, bounds.max_y, 0.0];
        let keys = geo_keys(crs);

        let tags = image.encoder();
        tags.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE_TAG), &[dx, dy, 0.0][..])
            .and_then(|_| tags.write_tag(Tag::Unknown(MODEL_TIEPOINT_TAG), &tiepoint[..]))
            .and_then(|_| tags.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY_TAG), &keys[..]))
            .and_then(|_| tags.write_tag(Tag::Unknown(GDAL_NODATA_TAG), "nan"))
            .map_err(|e| GridProcessorError::write_failed(path, e))?;

        image
            .write_data(&data)
            .map_err(|e| GridProcessorError::write_failed(path, e))?;

        tracing::debug!(path = %path.display(), width, height, crs = %crs, "Wrote GeoTIFF");
        Ok(())
    }
}

/// Pixels with row 0 at the north and column 0 at the west.
fn oriented_pixels(grid: &Grid) -> Vec<f32> {
    let geometry = &grid.geometry;
    let width = grid.width();
    let flip_rows = !geometry.is_north_up();
    let flip_cols = width > 1 && geometry.x[0] > geometry.x[width - 1];

    if !flip_rows && !flip_cols {
        return grid.data.clone();
    }

    let mut out = Vec::with_capacity(grid.data.len());
    for row in 0..grid.height() {
        let src_row = if flip_rows { grid.height() - 1 - row } else { row };
        let line = &grid.data[src_row * width..(src_row + 1) * width];
        if flip_cols {
            out.extend(line.iter().rev());
        } else {
            out.extend_from_slice(line);
        }
    }
    out
}

/// GeoKeyDirectory entries: header then (key, location, count, value).
fn geo_keys(crs: CrsCode) -> Vec<u16> {
    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY)
    };
    vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, crs.epsg(),
    ]
}
