//! Percent-of-normal ratio for a target month.

use chrono::{DateTime, Utc};
use swe_common::{TargetPeriod, TemporalAnchorConvention};

use crate::error::{GridProcessorError, Result};
use crate::normals::NormalsGrid;
use crate::types::{Grid, GriddedTimeSeries};

/// `100 * target / normal` for every cell, with the target timestamp.
#[derive(Debug, Clone)]
pub struct PercentOfNormalGrid {
    pub grid: Grid,
    pub timestamp: DateTime<Utc>,
}

/// Divide the target month's grid by its normals.
///
/// Division follows IEEE-754: `x / 0` is infinite, `0 / 0` and anything
/// involving `NaN` is `NaN`. Values are not clamped.
pub fn percent_of_normal(
    series: &GriddedTimeSeries,
    normals: &NormalsGrid,
    period: &TargetPeriod,
    convention: &TemporalAnchorConvention,
) -> Result<PercentOfNormalGrid> {
    let timestamp = convention.target_anchor(period).ok_or_else(|| {
        GridProcessorError::invalid_metadata(format!("no anchor timestamp for {}", period))
    })?;

    let target = series
        .select(&timestamp)?
        .ok_or(GridProcessorError::MissingTimestep(timestamp))?;

    if target.shape() != normals.grid.shape() {
        return Err(GridProcessorError::ShapeMismatch {
            expected: normals.grid.shape(),
            actual: target.shape(),
        });
    }

    let data: Vec<f32> = target
        .data
        .iter()
        .zip(&normals.grid.data)
        .map(|(&t, &n)| (t as f64 / n as f64 * 100.0) as f32)
        .collect();
    let grid = Grid::new(data, target.geometry.clone())?;

    tracing::info!(
        series = series.name(),
        timestamp = %timestamp,
        non_finite = grid.data.len() - grid.finite_count(),
        "Computed percent of normal"
    );

    Ok(PercentOfNormalGrid { grid, timestamp })
}
