//! Coordinate axis lookups.
//!
//! Latitude, longitude and time are all matched to the nearest axis value;
//! ties go to the lowest index.

use chrono::{DateTime, Duration, TimeZone, Utc};

use weather_common::{parse_timestamp, CatalogError, Result};

/// Index of the axis value closest to `value`.
///
/// Returns `None` for an empty axis or one holding only NaN. NaN entries
/// are skipped, and equidistant values resolve to the first occurrence.
///
/// ```rust
/// use data_cube::nearest_index;
///
/// assert_eq!(nearest_index(&[10.0, 20.0, 30.0], 19.9), Some(1));
/// assert_eq!(nearest_index(&[0.0, 10.0], 5.0), Some(0));
/// ```
pub fn nearest_index(axis: &[f64], value: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &candidate) in axis.iter().enumerate() {
        let distance = (candidate - value).abs();
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Index of the timestamp closest to `value`, ties to the lowest index.
pub fn nearest_time_index(axis: &[DateTime<Utc>], value: DateTime<Utc>) -> Option<usize> {
    axis.iter()
        .enumerate()
        .min_by_key(|(idx, t)| ((**t - value).num_milliseconds().unsigned_abs(), *idx))
        .map(|(idx, _)| idx)
}

/// Inclusive index range on the time axis covering `[start, end]`.
///
/// Each bound snaps to its nearest sample, so a range falling between two
/// samples still yields the closest one.
pub fn time_range_indices(
    axis: &[DateTime<Utc>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<(usize, usize)> {
    let first = nearest_time_index(axis, start)?;
    let last = nearest_time_index(axis, end)?;
    Some((first.min(last), first.max(last)))
}

/// Decoder for CF-style `"<unit> since <epoch>"` time encodings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    /// Length of one unit in milliseconds.
    unit_millis: i64,
    epoch: DateTime<Utc>,
}

impl Default for TimeUnits {
    fn default() -> Self {
        Self::seconds_since_unix_epoch()
    }
}

impl TimeUnits {
    /// Attribute string written for time axes.
    pub const UNIX_SECONDS: &'static str = "seconds since 1970-01-01T00:00:00Z";

    pub fn seconds_since_unix_epoch() -> Self {
        Self {
            unit_millis: 1_000,
            epoch: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
        }
    }

    /// Parse a units attribute such as `"hours since 2024-01-01 00:00:00"`.
    pub fn parse(units: &str) -> Result<Self> {
        let (unit, epoch) = units.split_once(" since ").ok_or_else(|| {
            CatalogError::data_access(format!("unsupported time units '{}'", units))
        })?;

        let unit_millis = match unit.trim().to_lowercase().as_str() {
            "milliseconds" | "millisecond" | "ms" => 1,
            "seconds" | "second" | "s" => 1_000,
            "minutes" | "minute" | "min" => 60_000,
            "hours" | "hour" | "h" => 3_600_000,
            "days" | "day" | "d" => 86_400_000,
            other => {
                return Err(CatalogError::data_access(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        let epoch = parse_timestamp(epoch)
            .map_err(|e| CatalogError::data_access(format!("bad time epoch: {}", e)))?;

        Ok(Self { unit_millis, epoch })
    }

    /// Convert an encoded offset to a timestamp.
    pub fn decode(&self, offset: f64) -> Result<DateTime<Utc>> {
        let undecodable =
            || CatalogError::data_access(format!("time value {} cannot be decoded", offset));

        let millis = (offset * self.unit_millis as f64).round();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return Err(undecodable());
        }
        Duration::try_milliseconds(millis as i64)
            .and_then(|delta| self.epoch.checked_add_signed(delta))
            .ok_or_else(undecodable)
    }
}
