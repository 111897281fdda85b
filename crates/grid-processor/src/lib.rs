//! Gridded SWE processing with Zarr support
//!
//! This crate reads snow-water-equivalent time series from xarray-style Zarr
//! stores in Azure Blob containers and reduces them to percent-of-normal
//! rasters. It provides:
//!
//! - **Lazy access**: only the coordinates are read when a dataset is
//!   opened; each timestep is fetched as one `[t, y, x]` subset on demand
//! - **Monthly normals**: NaN-skipping per-cell mean over the historical
//!   anchors of a month
//! - **Percent of normal**: IEEE-754 ratio of the target month to its normal
//! - **GeoTIFF output**: single-band Float32 rasters tagged with their CRS
//!
//! # Architecture
//!
//! ```text
//! SourceDescriptor + BoundingBox
//!      │
//!      ▼
//! DatasetAccessor::fetch()
//!      │
//!      ├─► Open variable and x/y/time coordinates
//!      │
//!      ├─► Select x and y ranges (inclusive)
//!      │
//!      └─► GriddedTimeSeries (lazy TimestepReader)
//!               │
//!               ├─► compute_normals(year, month)   reads historical anchors
//!               │
//!               └─► percent_of_normal()            reads the target anchor
//!                        │
//!                        ▼
//!                   RasterSink::write()  ──►  {family}_prcnt_of_norm_{mon}_{year}.tif
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{
//!     compute_normals, percent_of_normal, DatasetAccessor, EmptyNormalsPolicy,
//!     GeoTiffWriter, RasterSink, ZarrDatasetAccessor,
//! };
//!
//! let series = ZarrDatasetAccessor.fetch(&source, &bbox).await?;
//! let normals = compute_normals(&series, &period, &convention, EmptyNormalsPolicy::Fail)?;
//! let ratio = percent_of_normal(&series, &normals, &period, &convention)?;
//! GeoTiffWriter::new().write(&ratio.grid, CrsCode::Epsg3857, &path)?;
//! ```

pub mod azure_storage;
pub mod cf;
pub mod error;
pub mod normals;
pub mod processor;
pub mod ratio;
pub mod testdata;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use azure_storage::{create_azure_storage, AzureConfig, AzureStorage, TokioBlockOn};
pub use cf::{CfTimeUnits, TimeUnit, ValueDecoder};
pub use error::{GridProcessorError, Result};
pub use normals::{compute_normals, EmptyNormalsPolicy, NormalsGrid};
pub use processor::{
    open_zarr_series, select_range, DatasetAccessor, DimensionNames, InMemoryAccessor,
    InMemoryTimesteps, SourceDescriptor, ZarrDatasetAccessor, ZarrTimestepReader,
};
pub use ratio::{percent_of_normal, PercentOfNormalGrid};
pub use types::{Grid, GridGeometry, GriddedTimeSeries, TimestepReader};
pub use writer::{GeoTiffWriter, RasterSink};
