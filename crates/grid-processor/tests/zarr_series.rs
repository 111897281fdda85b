//! Integration test: open xarray-style Zarr stores as gridded time series.
//!
//! Stores are written to a temporary directory with `grid_processor::testdata`
//! and read back through `open_zarr_series`, the same path used for Azure.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use grid_processor::testdata::{
    anchor_times, coordinates, create_test_grid, write_packed_swe_zarr, write_swe_zarr,
    write_swe_zarr_v2,
};
use grid_processor::{open_zarr_series, DimensionNames, GridProcessorError, SourceDescriptor};
use swe_common::{BoundingBox, TemporalAnchorConvention};
use zarrs_filesystem::FilesystemStore;

fn source(variable: &str) -> SourceDescriptor {
    SourceDescriptor {
        endpoint: "file://".to_string(),
        container: "local".to_string(),
        prefix: String::new(),
        variable: variable.to_string(),
        credential: None,
        dimensions: DimensionNames::default(),
    }
}

#[test]
fn test_open_decodes_times_and_clips_bbox() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::REGIONAL, 2008..2011, 3);
    // 5 columns at x = 0, 10, .., 40; 4 rows at y = 30, 20, 10, 0
    let x = coordinates(0.0, 10.0, 5);
    let y = coordinates(30.0, -10.0, 4);
    let steps: Vec<Vec<f32>> = (0..3).map(|i| create_test_grid(5, 4, i as f32 * 0.25)).collect();
    write_swe_zarr(dir.path(), "1034", &x, &y, &times, &steps).unwrap();

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let bbox = BoundingBox::new(10.0, 5.0, 30.0, 20.0);
    let series = open_zarr_series(store, &source("1034"), &bbox).unwrap();

    assert_eq!(series.times(), times.as_slice());
    assert_eq!(series.shape(), (3, 2));
    assert_eq!(series.geometry().x, vec![10.0, 20.0, 30.0]);
    assert_eq!(series.geometry().y, vec![20.0, 10.0]);

    let grid = series
        .select(&Utc.with_ymd_and_hms(2009, 3, 1, 5, 0, 0).unwrap())
        .unwrap()
        .unwrap();
    // Rows 1..3 and columns 1..4 of col * 1000 + row + 0.25
    assert_eq!(
        grid.data,
        vec![1001.25, 2001.25, 3001.25, 1002.25, 2002.25, 3002.25]
    );
}

#[test]
fn test_anchor_hour_must_match_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let times = vec![Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap()];
    write_swe_zarr(
        dir.path(),
        "1034",
        &coordinates(0.0, 1.0, 2),
        &coordinates(1.0, -1.0, 2),
        &times,
        &[vec![1.0; 4]],
    )
    .unwrap();

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let series =
        open_zarr_series(store, &source("1034"), &BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();

    assert!(!series.contains(&Utc.with_ymd_and_hms(2010, 1, 1, 5, 0, 0).unwrap()));
    assert!(series.contains(&times[0]));
}

#[test]
fn test_packed_values_are_masked_and_scaled() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::GLOBAL, 2000..2001, 2);
    write_packed_swe_zarr(
        dir.path(),
        "swe",
        &coordinates(0.0, 1.0, 2),
        &coordinates(1.0, -1.0, 2),
        &times,
        &[vec![10, -9999, 0, 255]],
        -9999,
        0.5,
    )
    .unwrap();

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let series =
        open_zarr_series(store, &source("swe"), &BoundingBox::new(-1.0, -1.0, 2.0, 2.0)).unwrap();
    let grid = series.read_index(0).unwrap();

    assert_eq!(grid.data[0], 5.0);
    assert!(grid.data[1].is_nan());
    assert_eq!(grid.data[2], 0.0);
    assert_eq!(grid.data[3], 127.5);
}

#[test]
fn test_bbox_outside_grid_is_empty_selection() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::GLOBAL, 2000..2001, 1);
    write_swe_zarr(
        dir.path(),
        "swe",
        &coordinates(0.0, 1.0, 2),
        &coordinates(1.0, -1.0, 2),
        &times,
        &[vec![1.0; 4]],
    )
    .unwrap();

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let err = open_zarr_series(store, &source("swe"), &BoundingBox::new(100.0, 0.0, 200.0, 1.0))
        .unwrap_err();

    match err {
        GridProcessorError::EmptySelection { axis, .. } => assert_eq!(axis, "x"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_dimension_order_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::GLOBAL, 2000..2001, 1);
    write_swe_zarr(
        dir.path(),
        "swe",
        &coordinates(0.0, 1.0, 2),
        &coordinates(1.0, -1.0, 2),
        &times,
        &[vec![1.0; 4]],
    )
    .unwrap();

    let mut swapped = source("swe");
    swapped.dimensions = DimensionNames {
        time: "time".to_string(),
        y: "x".to_string(),
        x: "y".to_string(),
    };

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let err = open_zarr_series(store, &swapped, &BoundingBox::new(-5.0, -5.0, 5.0, 5.0))
        .unwrap_err();
    assert!(matches!(err, GridProcessorError::InvalidMetadata(_)));
}

#[test]
fn test_missing_variable_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let err = open_zarr_series(store, &source("swe"), &BoundingBox::new(0.0, 0.0, 1.0, 1.0))
        .unwrap_err();
    assert!(matches!(err, GridProcessorError::OpenFailed(_)));
}

#[test]
fn test_v2_store_opens_with_xarray_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::REGIONAL, 2008..2011, 3);
    let x = coordinates(0.0, 10.0, 5);
    let y = coordinates(30.0, -10.0, 4);
    let steps: Vec<Vec<f32>> = (0..3).map(|i| create_test_grid(5, 4, i as f32 * 0.25)).collect();
    write_swe_zarr_v2(dir.path(), "1034", &x, &y, &times, &steps, None).unwrap();

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let bbox = BoundingBox::new(10.0, 5.0, 30.0, 20.0);
    let series = open_zarr_series(store, &source("1034"), &bbox).unwrap();

    // Time units and calendar come from the v2 .zattrs document
    assert_eq!(series.times(), times.as_slice());
    assert_eq!(series.shape(), (3, 2));
    assert_eq!(series.geometry().x, vec![10.0, 20.0, 30.0]);
    assert_eq!(series.geometry().y, vec![20.0, 10.0]);

    let grid = series.read_index(2).unwrap();
    assert_eq!(
        grid.data,
        vec![1001.5, 2001.5, 3001.5, 1002.5, 2002.5, 3002.5]
    );
}

#[test]
fn test_v2_dimension_names_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::GLOBAL, 2000..2001, 1);
    write_swe_zarr_v2(
        dir.path(),
        "swe",
        &coordinates(0.0, 1.0, 2),
        &coordinates(1.0, -1.0, 2),
        &times,
        &[vec![1.0; 4]],
        None,
    )
    .unwrap();

    let mut renamed = source("swe");
    renamed.dimensions = DimensionNames {
        time: "time".to_string(),
        y: "lat".to_string(),
        x: "lon".to_string(),
    };

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let err = open_zarr_series(store, &renamed, &BoundingBox::new(-5.0, -5.0, 5.0, 5.0))
        .unwrap_err();
    match err {
        GridProcessorError::InvalidMetadata(message) => {
            assert!(message.contains("\"y\""), "{message}");
            assert!(message.contains("\"lat\""), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_v2_null_fill_keeps_zero_swe() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::GLOBAL, 2000..2001, 2);
    write_swe_zarr_v2(
        dir.path(),
        "swe",
        &coordinates(0.0, 1.0, 2),
        &coordinates(1.0, -1.0, 2),
        &times,
        &[vec![0.0, 12.5, 0.0, f32::NAN]],
        None,
    )
    .unwrap();

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let series =
        open_zarr_series(store, &source("swe"), &BoundingBox::new(-1.0, -1.0, 2.0, 2.0)).unwrap();
    let grid = series.read_index(0).unwrap();

    assert_eq!(grid.data[0], 0.0);
    assert_eq!(grid.data[1], 12.5);
    assert_eq!(grid.data[2], 0.0);
    assert!(grid.data[3].is_nan());
}

#[test]
fn test_v2_numeric_fill_is_masked() {
    let dir = tempfile::tempdir().unwrap();
    let times = anchor_times(&TemporalAnchorConvention::GLOBAL, 2000..2001, 2);
    write_swe_zarr_v2(
        dir.path(),
        "swe",
        &coordinates(0.0, 1.0, 2),
        &coordinates(1.0, -1.0, 2),
        &times,
        &[vec![-9999.0, 3.0, 0.0, -9999.0]],
        Some(-9999.0),
    )
    .unwrap();

    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let series =
        open_zarr_series(store, &source("swe"), &BoundingBox::new(-1.0, -1.0, 2.0, 2.0)).unwrap();
    let grid = series.read_index(0).unwrap();

    assert!(grid.data[0].is_nan());
    assert_eq!(grid.data[1], 3.0);
    assert_eq!(grid.data[2], 0.0);
    assert!(grid.data[3].is_nan());
}
