//! Test data generation utilities.
//!
//! Builds small xarray-style Zarr stores on the local filesystem: one data
//! variable shaped `(time, y, x)` plus 1-D `x`, `y` and `time` coordinate
//! arrays, with the `_ARRAY_DIMENSIONS` and CF attributes xarray writes.
//! Integration tests open them through the same code path used for Azure.
//!
//! [`write_swe_zarr_v2`] writes the Zarr v2 layout (`.zarray`, `.zattrs`,
//! uncompressed `0.0.0` chunks) that xarray produces with `to_zarr`.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::{StoreKey, WritableStorageTraits};
use zarrs_filesystem::FilesystemStore;

use swe_common::TemporalAnchorConvention;

/// Units the time coordinate of generated stores is encoded with.
pub const TIME_UNITS: &str = "hours since 1970-01-01 00:00:00";

type TestResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Grid where value at (col, row) = col * 1000 + row + offset.
pub fn create_test_grid(width: usize, height: usize, offset: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32 + offset);
        }
    }
    data
}

/// Evenly spaced cell centres starting at `start`.
pub fn coordinates(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Anchor timestamps of `month` for each of `years` under `convention`.
pub fn anchor_times(
    convention: &TemporalAnchorConvention,
    years: impl IntoIterator<Item = i32>,
    month: u32,
) -> Vec<DateTime<Utc>> {
    years
        .into_iter()
        .filter_map(|year| convention.anchor(year, month))
        .collect()
}

fn dims_attr(names: &[&str]) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("_ARRAY_DIMENSIONS".to_string(), json!(names));
    attrs
}

fn write_coordinates(
    store: &Arc<FilesystemStore>,
    x: &[f64],
    y: &[f64],
    times: &[DateTime<Utc>],
) -> TestResult<()> {
    for (name, values) in [("x", x), ("y", y)] {
        let len = values.len() as u64;
        let array = ArrayBuilder::new(
            vec![len],
            DataType::Float64,
            vec![len.max(1)].try_into()?,
            FillValue::from(f64::NAN),
        )
        .attributes(dims_attr(&[name]))
        .build(store.clone(), &format!("/{}", name))?;
        array.store_metadata()?;
        if len > 0 {
            array.store_array_subset_elements(&ArraySubset::new_with_shape(vec![len]), values)?;
        }
    }

    let encoded: Vec<i64> = times
        .iter()
        .map(|t| (*t - DateTime::<Utc>::UNIX_EPOCH).num_hours())
        .collect();
    let len = encoded.len() as u64;

    let mut attrs = dims_attr(&["time"]);
    attrs.insert("units".to_string(), json!(TIME_UNITS));
    attrs.insert("calendar".to_string(), json!("proleptic_gregorian"));

    let array = ArrayBuilder::new(
        vec![len],
        DataType::Int64,
        vec![len.max(1)].try_into()?,
        FillValue::from(0i64),
    )
    .attributes(attrs)
    .build(store.clone(), "/time")?;
    array.store_metadata()?;
    if len > 0 {
        array.store_array_subset_elements(&ArraySubset::new_with_shape(vec![len]), &encoded)?;
    }
    Ok(())
}

/// Write a Float32 `(time, y, x)` variable with `NaN` as its fill value.
///
/// `steps` holds one row-major `x.len() * y.len()` grid per timestamp.
pub fn write_swe_zarr(
    path: &Path,
    variable: &str,
    x: &[f64],
    y: &[f64],
    times: &[DateTime<Utc>],
    steps: &[Vec<f32>],
) -> TestResult<()> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);
    write_coordinates(&store, x, y, times)?;

    let (nt, ny, nx) = (times.len() as u64, y.len() as u64, x.len() as u64);
    let array = ArrayBuilder::new(
        vec![nt, ny, nx],
        DataType::Float32,
        vec![1, ny.max(1), nx.max(1)].try_into()?,
        FillValue::from(f32::NAN),
    )
    .attributes({
        let mut attrs = dims_attr(&["time", "y", "x"]);
        attrs.insert("units".to_string(), json!("mm"));
        attrs
    })
    .build(store.clone(), &format!("/{}", variable))?;
    array.store_metadata()?;

    let data: Vec<f32> = steps.iter().flatten().copied().collect();
    if !data.is_empty() {
        let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], vec![nt, ny, nx])?;
        array.store_array_subset_elements(&subset, &data)?;
    }
    Ok(())
}

/// Write an Int16 variable packed with a fill value and scale factor, the
/// way gridded products are often distributed.
#[allow(clippy::too_many_arguments)]
pub fn write_packed_swe_zarr(
    path: &Path,
    variable: &str,
    x: &[f64],
    y: &[f64],
    times: &[DateTime<Utc>],
    raw_steps: &[Vec<i16>],
    fill: i16,
    scale_factor: f64,
) -> TestResult<()> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);
    write_coordinates(&store, x, y, times)?;

    let (nt, ny, nx) = (times.len() as u64, y.len() as u64, x.len() as u64);
    let array = ArrayBuilder::new(
        vec![nt, ny, nx],
        DataType::Int16,
        vec![1, ny.max(1), nx.max(1)].try_into()?,
        FillValue::from(fill),
    )
    .attributes({
        let mut attrs = dims_attr(&["time", "y", "x"]);
        attrs.insert("scale_factor".to_string(), json!(scale_factor));
        attrs
    })
    .build(store.clone(), &format!("/{}", variable))?;
    array.store_metadata()?;

    let data: Vec<i16> = raw_steps.iter().flatten().copied().collect();
    if !data.is_empty() {
        let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], vec![nt, ny, nx])?;
        array.store_array_subset_elements(&subset, &data)?;
    }
    Ok(())
}

fn put_json(store: &FilesystemStore, key: &str, value: &Value) -> TestResult<()> {
    store.set(&StoreKey::new(key)?, serde_json::to_vec_pretty(value)?.into())?;
    Ok(())
}

/// Write one uncompressed, single-chunk, C-order v2 array.
fn write_v2_array(
    store: &FilesystemStore,
    name: &str,
    shape: &[u64],
    dtype: &str,
    fill_value: Value,
    attributes: Value,
    chunk: Vec<u8>,
) -> TestResult<()> {
    let chunks: Vec<u64> = shape.iter().map(|&n| n.max(1)).collect();
    let zarray = json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": chunks,
        "dtype": dtype,
        "compressor": null,
        "fill_value": fill_value,
        "filters": null,
        "order": "C",
    });
    put_json(store, &format!("{}/.zarray", name), &zarray)?;
    put_json(store, &format!("{}/.zattrs", name), &attributes)?;

    if shape.iter().all(|&n| n > 0) {
        let chunk_key = vec!["0"; shape.len()].join(".");
        store.set(&StoreKey::new(format!("{}/{}", name, chunk_key))?, chunk.into())?;
    }
    Ok(())
}

/// Write a Float32 `(time, y, x)` variable in the Zarr v2 layout.
///
/// `fill_value` of `None` is stored as `null`, which is what xarray writes
/// for a variable without `_FillValue`.
pub fn write_swe_zarr_v2(
    path: &Path,
    variable: &str,
    x: &[f64],
    y: &[f64],
    times: &[DateTime<Utc>],
    steps: &[Vec<f32>],
    fill_value: Option<f32>,
) -> TestResult<()> {
    std::fs::create_dir_all(path)?;
    let store = FilesystemStore::new(path)?;
    put_json(&store, ".zgroup", &json!({"zarr_format": 2}))?;
    put_json(&store, ".zattrs", &json!({}))?;

    for (name, values) in [("x", x), ("y", y)] {
        write_v2_array(
            &store,
            name,
            &[values.len() as u64],
            "<f8",
            json!("NaN"),
            json!({"_ARRAY_DIMENSIONS": [name]}),
            values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        )?;
    }

    let encoded: Vec<u8> = times
        .iter()
        .map(|t| (*t - DateTime::<Utc>::UNIX_EPOCH).num_hours())
        .flat_map(|v| v.to_le_bytes())
        .collect();
    write_v2_array(
        &store,
        "time",
        &[times.len() as u64],
        "<i8",
        Value::Null,
        json!({
            "_ARRAY_DIMENSIONS": ["time"],
            "units": TIME_UNITS,
            "calendar": "proleptic_gregorian",
        }),
        encoded,
    )?;

    let fill = match fill_value {
        Some(v) if v.is_nan() => json!("NaN"),
        Some(v) => json!(v),
        None => Value::Null,
    };
    write_v2_array(
        &store,
        variable,
        &[times.len() as u64, y.len() as u64, x.len() as u64],
        "<f4",
        fill,
        json!({"_ARRAY_DIMENSIONS": ["time", "y", "x"], "units": "mm"}),
        steps.iter().flatten().flat_map(|v| v.to_le_bytes()).collect(),
    )
}
