//! Monthly normals: per-cell mean over the historical anchors of a month.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swe_common::{TargetPeriod, TemporalAnchorConvention};

use crate::error::{GridProcessorError, Result};
use crate::types::{Grid, GriddedTimeSeries};

/// What to do when none of the historical anchors are in the series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyNormalsPolicy {
    /// Fail with [`GridProcessorError::NoHistoricalAnchors`].
    #[default]
    Fail,
    /// Produce an all-`NaN` normals grid.
    MissingGrid,
}

/// Normals for one (year, month) plus the anchors that contributed.
#[derive(Debug, Clone)]
pub struct NormalsGrid {
    pub grid: Grid,
    pub anchors: Vec<DateTime<Utc>>,
}

impl NormalsGrid {
    /// Number of historical anchors averaged (k).
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

/// NaN-skipping running mean, accumulated in `f64`.
struct MeanAccumulator {
    sums: Vec<f64>,
    counts: Vec<u32>,
}

impl MeanAccumulator {
    fn new(len: usize) -> Self {
        Self {
            sums: vec![0.0; len],
            counts: vec![0; len],
        }
    }

    fn add(&mut self, values: &[f32]) {
        for ((sum, count), &v) in self.sums.iter_mut().zip(self.counts.iter_mut()).zip(values) {
            if !v.is_nan() {
                *sum += v as f64;
                *count += 1;
            }
        }
    }

    fn finish(self) -> Vec<f32> {
        self.sums
            .into_iter()
            .zip(self.counts)
            .map(|(sum, count)| {
                if count == 0 {
                    f32::NAN
                } else {
                    (sum / count as f64) as f32
                }
            })
            .collect()
    }
}

/// Average the series over every historical anchor of `period`'s month.
///
/// Candidate years run from the convention's earliest valid year up to the
/// year before the target. Anchors absent from the series are skipped.
pub fn compute_normals(
    series: &GriddedTimeSeries,
    period: &TargetPeriod,
    convention: &TemporalAnchorConvention,
    policy: EmptyNormalsPolicy,
) -> Result<NormalsGrid> {
    let candidates = convention.historical_anchors(period);
    let mut anchors = Vec::with_capacity(candidates.len());
    let mut acc = MeanAccumulator::new(series.geometry().len());

    for anchor in candidates {
        match series.select(&anchor)? {
            Some(grid) => {
                acc.add(&grid.data);
                anchors.push(anchor);
            }
            None => {
                tracing::debug!(series = series.name(), anchor = %anchor, "Anchor not in series, skipping");
            }
        }
    }

    if anchors.is_empty() {
        match policy {
            EmptyNormalsPolicy::Fail => {
                return Err(GridProcessorError::NoHistoricalAnchors {
                    year: period.year(),
                    month: period.month(),
                })
            }
            EmptyNormalsPolicy::MissingGrid => {
                tracing::warn!(
                    series = series.name(),
                    period = %period,
                    "No historical anchors present, normals are all NaN"
                );
                return Ok(NormalsGrid {
                    grid: Grid::filled(f32::NAN, series.geometry().clone()),
                    anchors,
                });
            }
        }
    }

    tracing::info!(
        series = series.name(),
        period = %period,
        anchors = anchors.len(),
        "Computed monthly normals"
    );

    Ok(NormalsGrid {
        grid: Grid::new(acc.finish(), series.geometry().clone())?,
        anchors,
    })
}
