//! Target periods and the calendar anchors used to sample monthly SWE.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Earliest year accepted as a target.
pub const MIN_YEAR: i32 = 1900;
/// Latest year accepted as a target.
pub const MAX_YEAR: i32 = 2100;

/// A validated (year, month) pair the pipeline computes percent-of-normal for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPeriod {
    year: i32,
    month: u32,
}

impl TargetPeriod {
    /// Create a target period, checking both fields are in range.
    pub fn new(year: i32, month: u32) -> Result<Self, TargetParseError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(TargetParseError::InvalidYear(year.to_string()));
        }
        if !(1..=12).contains(&month) {
            return Err(TargetParseError::InvalidMonth(month.to_string()));
        }
        Ok(Self { year, month })
    }

    /// The period containing the given date.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a textual year. Blank input resolves to `default`.
    pub fn parse_year(input: &str, default: i32) -> Result<i32, TargetParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(default);
        }
        input
            .parse::<i32>()
            .ok()
            .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
            .ok_or_else(|| TargetParseError::InvalidYear(input.to_string()))
    }

    /// Parse a textual month number. Blank input resolves to `default`.
    pub fn parse_month(input: &str, default: u32) -> Result<u32, TargetParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(default);
        }
        input
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| TargetParseError::InvalidMonth(input.to_string()))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Three-letter lowercase month name, e.g. "mar".
    pub fn month_abbrev(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%b").to_string().to_lowercase())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for TargetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Where a dataset family places "the first of the month" in its time index.
///
/// Anchors are always on day 1 at `anchor_hour` UTC. No anchor exists before
/// `earliest_valid_year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalAnchorConvention {
    pub anchor_hour: u32,
    pub earliest_valid_year: i32,
}

impl TemporalAnchorConvention {
    /// SNODAS daily grids are stamped at 05:00 UTC and usable from 2008.
    pub const REGIONAL: Self = Self {
        anchor_hour: 5,
        earliest_valid_year: 2008,
    };

    /// Copernicus grids are stamped at 00:00 UTC and usable from 2000.
    pub const GLOBAL: Self = Self {
        anchor_hour: 0,
        earliest_valid_year: 2000,
    };

    pub fn new(anchor_hour: u32, earliest_valid_year: i32) -> Self {
        Self {
            anchor_hour,
            earliest_valid_year,
        }
    }

    /// The exact anchor timestamp for (year, month).
    ///
    /// Returns `None` if the hour or month cannot form a valid timestamp.
    pub fn anchor(&self, year: i32, month: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(year, month, 1, self.anchor_hour, 0, 0)
            .single()
    }

    /// Anchor of the target period itself.
    pub fn target_anchor(&self, period: &TargetPeriod) -> Option<DateTime<Utc>> {
        self.anchor(period.year(), period.month())
    }

    /// Candidate anchors for every year from `earliest_valid_year` through
    /// `period.year() - 1`, oldest first.
    ///
    /// Empty when the target year is at or before the earliest valid year.
    pub fn historical_anchors(&self, period: &TargetPeriod) -> Vec<DateTime<Utc>> {
        (self.earliest_valid_year..period.year())
            .filter_map(|year| self.anchor(year, period.month()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetParseError {
    #[error("Invalid year '{0}'. Please enter a 4-digit year between 1900 and 2100.")]
    InvalidYear(String),

    #[error("Invalid month '{0}'. Please enter a number from 1 to 12.")]
    InvalidMonth(String),
}

impl TargetParseError {
    /// Name of the offending input field.
    pub fn field(&self) -> &'static str {
        match self {
            TargetParseError::InvalidYear(_) => "year",
            TargetParseError::InvalidMonth(_) => "month",
        }
    }
}
