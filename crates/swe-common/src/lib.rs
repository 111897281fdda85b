//! Common types shared by the SWE percent-of-normal crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{SweError, SweResult};
pub use time::{TargetParseError, TargetPeriod, TemporalAnchorConvention};
