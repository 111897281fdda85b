//! Zarr dataset accessor.
//!
//! Opens an xarray-style Zarr store (one array per variable and per
//! coordinate) and exposes a data variable as a [`GriddedTimeSeries`]
//! clipped to a bounding box. Only the time and spatial coordinates are read
//! up front; each timestep is fetched when the series asks for it.

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use swe_common::BoundingBox;
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::{ReadableStorageTraits, StoreKey};

use crate::azure_storage::{create_azure_storage, AzureConfig};
use crate::cf::{attr_number, CfTimeUnits, ValueDecoder};
use crate::error::{GridProcessorError, Result};
use crate::types::{GridGeometry, GriddedTimeSeries, TimestepReader};

use super::{DatasetAccessor, DimensionNames, SourceDescriptor};

/// Dataset accessor for Zarr stores in Azure Blob containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZarrDatasetAccessor;

#[async_trait]
impl DatasetAccessor for ZarrDatasetAccessor {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        bbox: &BoundingBox,
    ) -> Result<GriddedTimeSeries> {
        let config = AzureConfig::from_descriptor(source)?;
        let storage = create_azure_storage(&config)?;

        tracing::debug!(location = %source.location(), "Opening Zarr store");
        open_zarr_series(storage, source, bbox)
    }
}

/// Open `source.variable` from a Zarr store and clip it to `bbox`.
pub fn open_zarr_series<S: ReadableStorageTraits + Send + Sync + 'static>(
    storage: Arc<S>,
    source: &SourceDescriptor,
    bbox: &BoundingBox,
) -> Result<GriddedTimeSeries> {
    let dims = &source.dimensions;

    let array = Array::open(storage.clone(), &node_path(&source.variable))
        .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", source.variable, e)))?;
    let metadata = stored_metadata(storage.as_ref(), &source.variable)
        .unwrap_or_else(|| StoredMetadata::from_array(&array));
    check_dimensions(&array, &metadata.attributes, &source.variable, dims)?;

    let x = read_coordinate(&storage, &dims.x)?;
    let y = read_coordinate(&storage, &dims.y)?;
    let times = read_times(&storage, &dims.time)?;

    let expected = [times.len() as u64, y.len() as u64, x.len() as u64];
    if array.shape() != expected {
        return Err(GridProcessorError::invalid_metadata(format!(
            "{} has shape {:?} but coordinates imply {:?}",
            source.variable,
            array.shape(),
            expected
        )));
    }

    let x_range = select_range(&x, bbox.min_x, bbox.max_x).ok_or_else(|| {
        GridProcessorError::EmptySelection {
            axis: dims.x.clone(),
            min: bbox.min_x,
            max: bbox.max_x,
        }
    })?;
    let y_range = select_range(&y, bbox.min_y, bbox.max_y).ok_or_else(|| {
        GridProcessorError::EmptySelection {
            axis: dims.y.clone(),
            min: bbox.min_y,
            max: bbox.max_y,
        }
    })?;

    let geometry = GridGeometry::new(x[x_range.clone()].to_vec(), y[y_range.clone()].to_vec());
    let decoder = ValueDecoder::from_attributes(&metadata.attributes, metadata.fill_value);

    tracing::info!(
        location = %source.location(),
        timesteps = times.len(),
        width = geometry.width(),
        height = geometry.height(),
        "Opened gridded time series"
    );

    let reader = ZarrTimestepReader {
        array,
        x_range: x_range.start as u64..x_range.end as u64,
        y_range: y_range.start as u64..y_range.end as u64,
        decoder,
    };

    Ok(GriddedTimeSeries::new(
        format!("{}/{}", source.container, source.variable),
        times,
        geometry,
        Box::new(reader),
    ))
}

/// Reads one `[t, y0..y1, x0..x1]` block per timestep.
pub struct ZarrTimestepReader<S: ReadableStorageTraits + 'static> {
    array: Array<S>,
    x_range: Range<u64>,
    y_range: Range<u64>,
    decoder: ValueDecoder,
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> TimestepReader for ZarrTimestepReader<S> {
    fn read_timestep(&self, index: usize) -> Result<Vec<f32>> {
        let t = index as u64;
        let subset =
            ArraySubset::new_with_ranges(&[t..t + 1, self.y_range.clone(), self.x_range.clone()]);

        tracing::debug!(index, subset = ?subset, "Reading timestep");

        let raw = retrieve_f64(&self.array, &subset)?;
        Ok(raw.into_iter().map(|v| self.decoder.decode(v)).collect())
    }
}

/// Index range of the coordinates lying within `[min, max]` (inclusive).
///
/// Coordinates are assumed monotonic in either direction.
pub fn select_range(coords: &[f64], min: f64, max: f64) -> Option<Range<usize>> {
    let mut first = None;
    let mut last = 0;
    for (i, &c) in coords.iter().enumerate() {
        if c >= min && c <= max {
            first.get_or_insert(i);
            last = i;
        }
    }
    first.map(|start| start..last + 1)
}

fn node_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}", name)
    }
}

fn check_dimensions<S: ReadableStorageTraits + 'static>(
    array: &Array<S>,
    attributes: &Map<String, Value>,
    variable: &str,
    dims: &DimensionNames,
) -> Result<()> {
    if array.shape().len() != 3 {
        return Err(GridProcessorError::invalid_metadata(format!(
            "{} must have 3 dimensions, found {}",
            variable,
            array.shape().len()
        )));
    }

    let Some(declared) = attributes.get("_ARRAY_DIMENSIONS") else {
        tracing::debug!(variable, "No _ARRAY_DIMENSIONS attribute, assuming (time, y, x)");
        return Ok(());
    };

    let declared: Vec<&str> = declared
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let expected = [dims.time.as_str(), dims.y.as_str(), dims.x.as_str()];

    if declared != expected {
        return Err(GridProcessorError::invalid_metadata(format!(
            "{} has dimensions {:?}, expected {:?}",
            variable, declared, expected
        )));
    }
    Ok(())
}

fn open_1d<S: ReadableStorageTraits + Send + Sync + 'static>(
    storage: &Arc<S>,
    name: &str,
) -> Result<Array<S>> {
    let array = Array::open(storage.clone(), &node_path(name))
        .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", name, e)))?;
    if array.shape().len() != 1 {
        return Err(GridProcessorError::invalid_metadata(format!(
            "coordinate {} must be 1-D, found shape {:?}",
            name,
            array.shape()
        )));
    }
    Ok(array)
}

fn read_coordinate<S: ReadableStorageTraits + Send + Sync + 'static>(
    storage: &Arc<S>,
    name: &str,
) -> Result<Vec<f64>> {
    let array = open_1d(storage, name)?;
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    retrieve_f64(&array, &subset)
}

fn read_times<S: ReadableStorageTraits + Send + Sync + 'static>(
    storage: &Arc<S>,
    name: &str,
) -> Result<Vec<DateTime<Utc>>> {
    let array = open_1d(storage, name)?;
    let attributes = stored_metadata(storage.as_ref(), name)
        .unwrap_or_else(|| StoredMetadata::from_array(&array))
        .attributes;
    let units = CfTimeUnits::from_attributes(&attributes)?;
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());

    let decoded: Vec<Option<DateTime<Utc>>> = if is_integer(array.data_type()) {
        retrieve_i64(&array, &subset)?
            .into_iter()
            .map(|v| units.decode_i64(v))
            .collect()
    } else {
        retrieve_f64(&array, &subset)?
            .into_iter()
            .map(|v| units.decode_f64(v))
            .collect()
    };

    decoded
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            t.ok_or_else(|| {
                GridProcessorError::invalid_metadata(format!(
                    "{}[{}] cannot be decoded as a timestamp",
                    name, i
                ))
            })
        })
        .collect()
}

/// Array metadata exactly as written in the store.
#[derive(Debug, Default)]
struct StoredMetadata {
    fill_value: Option<f64>,
    attributes: Map<String, Value>,
}

impl StoredMetadata {
    fn from_array<S: ReadableStorageTraits + 'static>(array: &Array<S>) -> Self {
        Self {
            fill_value: None,
            attributes: array.attributes().clone(),
        }
    }
}

/// Read the raw `.zarray` + `.zattrs` (v2) or `zarr.json` (v3) documents.
///
/// An unset (`null`) fill value stays unset instead of defaulting to zero,
/// and v3 `dimension_names` are exposed as `_ARRAY_DIMENSIONS` when the
/// attributes do not already carry them.
fn stored_metadata<S: ReadableStorageTraits + ?Sized>(
    storage: &S,
    name: &str,
) -> Option<StoredMetadata> {
    let name = name.trim_matches('/');
    let read = |doc: &str| -> Option<Value> {
        let key = StoreKey::new(format!("{}/{}", name, doc)).ok()?;
        let bytes = storage.get(&key).ok()??;
        serde_json::from_slice(&bytes).ok()
    };
    let object = |value: Option<&Value>| {
        value
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    };

    if let Some(zarray) = read(".zarray") {
        return Some(StoredMetadata {
            fill_value: zarray.get("fill_value").and_then(attr_number),
            attributes: object(read(".zattrs").as_ref()),
        });
    }

    let zarr_json = read("zarr.json")?;
    let mut attributes = object(zarr_json.get("attributes"));
    if let Some(names) = zarr_json.get("dimension_names").filter(|v| !v.is_null()) {
        attributes
            .entry("_ARRAY_DIMENSIONS")
            .or_insert_with(|| names.clone());
    }
    Some(StoredMetadata {
        fill_value: zarr_json.get("fill_value").and_then(attr_number),
        attributes,
    })
}

fn is_integer(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

macro_rules! retrieve_converted {
    ($array:expr, $subset:expr, $t:ty, $conv:expr) => {
        $array
            .retrieve_array_subset_elements::<$t>($subset)
            .map_err(|e| GridProcessorError::read_failed(e.to_string()))?
            .into_iter()
            .map($conv)
            .collect()
    };
}

fn retrieve_f64<S: ReadableStorageTraits + 'static>(
    array: &Array<S>,
    subset: &ArraySubset,
) -> Result<Vec<f64>> {
    let values = match array.data_type() {
        DataType::Int8 => retrieve_converted!(array, subset, i8, |v| v as f64),
        DataType::Int16 => retrieve_converted!(array, subset, i16, |v| v as f64),
        DataType::Int32 => retrieve_converted!(array, subset, i32, |v| v as f64),
        DataType::Int64 => retrieve_converted!(array, subset, i64, |v| v as f64),
        DataType::UInt8 => retrieve_converted!(array, subset, u8, |v| v as f64),
        DataType::UInt16 => retrieve_converted!(array, subset, u16, |v| v as f64),
        DataType::UInt32 => retrieve_converted!(array, subset, u32, |v| v as f64),
        DataType::UInt64 => retrieve_converted!(array, subset, u64, |v| v as f64),
        DataType::Float32 => retrieve_converted!(array, subset, f32, |v| v as f64),
        DataType::Float64 => retrieve_converted!(array, subset, f64, |v| v),
        other => {
            return Err(GridProcessorError::invalid_metadata(format!(
                "unsupported data type {:?}",
                other
            )))
        }
    };
    Ok(values)
}

fn retrieve_i64<S: ReadableStorageTraits + 'static>(
    array: &Array<S>,
    subset: &ArraySubset,
) -> Result<Vec<i64>> {
    let values = match array.data_type() {
        DataType::Int8 => retrieve_converted!(array, subset, i8, i64::from),
        DataType::Int16 => retrieve_converted!(array, subset, i16, i64::from),
        DataType::Int32 => retrieve_converted!(array, subset, i32, i64::from),
        DataType::Int64 => retrieve_converted!(array, subset, i64, |v| v),
        DataType::UInt8 => retrieve_converted!(array, subset, u8, i64::from),
        DataType::UInt16 => retrieve_converted!(array, subset, u16, i64::from),
        DataType::UInt32 => retrieve_converted!(array, subset, u32, i64::from),
        DataType::UInt64 => retrieve_converted!(array, subset, u64, |v| v as i64),
        other => {
            return Err(GridProcessorError::invalid_metadata(format!(
                "{:?} is not an integer type",
                other
            )))
        }
    };
    Ok(values)
}
