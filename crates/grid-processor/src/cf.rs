//! CF-convention decoding for time coordinates and packed values.
//!
//! Zarr datasets written by xarray store time as integers with a
//! `"<unit> since <reference>"` attribute, and data variables may carry
//! `_FillValue`, `missing_value`, `scale_factor` and `add_offset`.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{GridProcessorError, Result};

/// Units a CF time offset can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "days" | "day" | "d" => Some(Self::Days),
            "hours" | "hour" | "hr" | "hrs" | "h" => Some(Self::Hours),
            "minutes" | "minute" | "min" | "mins" => Some(Self::Minutes),
            "seconds" | "second" | "sec" | "secs" | "s" => Some(Self::Seconds),
            "milliseconds" | "millisecond" | "ms" => Some(Self::Milliseconds),
            "microseconds" | "microsecond" | "us" => Some(Self::Microseconds),
            "nanoseconds" | "nanosecond" | "ns" => Some(Self::Nanoseconds),
            _ => None,
        }
    }

    fn nanos(&self) -> i128 {
        match self {
            Self::Days => 86_400_000_000_000,
            Self::Hours => 3_600_000_000_000,
            Self::Minutes => 60_000_000_000,
            Self::Seconds => 1_000_000_000,
            Self::Milliseconds => 1_000_000,
            Self::Microseconds => 1_000,
            Self::Nanoseconds => 1,
        }
    }
}

/// Parsed `units`/`calendar` pair of a CF time coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    pub epoch: DateTime<Utc>,
}

impl CfTimeUnits {
    /// Parse e.g. `"hours since 2003-09-30 06:00:00"`.
    ///
    /// Only calendars equivalent to the proleptic Gregorian calendar are
    /// accepted.
    pub fn parse(units: &str, calendar: Option<&str>) -> Result<Self> {
        if let Some(calendar) = calendar {
            match calendar.to_lowercase().as_str() {
                "standard" | "gregorian" | "proleptic_gregorian" => {}
                other => {
                    return Err(GridProcessorError::invalid_metadata(format!(
                        "unsupported calendar '{}'",
                        other
                    )))
                }
            }
        }

        let (unit, reference) = units
            .split_once(" since ")
            .ok_or_else(|| GridProcessorError::invalid_metadata(format!("bad time units '{}'", units)))?;
        let unit = TimeUnit::parse(unit.trim()).ok_or_else(|| {
            GridProcessorError::invalid_metadata(format!("unknown time unit in '{}'", units))
        })?;
        let epoch = parse_reference(reference.trim()).ok_or_else(|| {
            GridProcessorError::invalid_metadata(format!("bad reference date in '{}'", units))
        })?;

        Ok(Self { unit, epoch })
    }

    /// Build from the attributes of a time coordinate array.
    pub fn from_attributes(attrs: &Map<String, Value>) -> Result<Self> {
        let units = attrs
            .get("units")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GridProcessorError::invalid_metadata("time coordinate has no units"))?;
        let calendar = attrs.get("calendar").and_then(|v| v.as_str());
        Self::parse(units, calendar)
    }

    /// Decode an integer offset.
    pub fn decode_i64(&self, value: i64) -> Option<DateTime<Utc>> {
        self.offset_nanos(value as i128 * self.unit.nanos())
    }

    /// Decode a floating offset, rounded to the nearest nanosecond.
    pub fn decode_f64(&self, value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let nanos = (value * self.unit.nanos() as f64).round();
        if nanos.abs() > i128::MAX as f64 {
            return None;
        }
        self.offset_nanos(nanos as i128)
    }

    fn offset_nanos(&self, nanos: i128) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
        let sub = nanos.rem_euclid(1_000_000_000) as i64;
        let offset = Duration::try_seconds(secs)? + Duration::nanoseconds(sub);
        self.epoch.checked_add_signed(offset)
    }
}

fn parse_reference(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let s = s
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim_end_matches("+0000")
        .trim();

    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// CF mask-and-scale applied to raw stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueDecoder {
    pub fill_values: Vec<f64>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
}

impl ValueDecoder {
    /// Collect `_FillValue`, `missing_value`, `scale_factor` and
    /// `add_offset` from variable attributes, plus the array's own fill value.
    pub fn from_attributes(attrs: &Map<String, Value>, array_fill: Option<f64>) -> Self {
        let mut fill_values: Vec<f64> = array_fill.into_iter().collect();
        for key in ["_FillValue", "missing_value"] {
            match attrs.get(key) {
                Some(Value::Array(values)) => {
                    fill_values.extend(values.iter().filter_map(attr_number))
                }
                Some(value) => fill_values.extend(attr_number(value)),
                None => {}
            }
        }
        fill_values.retain(|v| !v.is_nan());
        fill_values.dedup();

        Self {
            fill_values,
            scale_factor: attrs.get("scale_factor").and_then(attr_number),
            add_offset: attrs.get("add_offset").and_then(attr_number),
        }
    }

    /// Decode one raw value to the physical value, `NaN` when missing.
    pub fn decode(&self, raw: f64) -> f32 {
        if raw.is_nan() || self.fill_values.iter().any(|&fill| fill == raw) {
            return f32::NAN;
        }
        let scaled = raw * self.scale_factor.unwrap_or(1.0) + self.add_offset.unwrap_or(0.0);
        scaled as f32
    }
}

/// JSON number, or the special float strings zarr uses for non-finite fills.
pub(crate) fn attr_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}
