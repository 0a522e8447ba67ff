//! Test data generators for creating synthetic data cubes.
//!
//! These generators create predictable, verifiable values so a test can
//! tell exactly which `[time, latitude, longitude]` cell it read back.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use data_cube::CubeSnapshot;
use weather_common::WeatherVariable;

/// Creates a predictable cell value.
///
/// Each value is calculated as: `variable_offset + t * 10_000 + lat * 100 + lon`
/// where the offset is `1_000_000 * (position of the variable in
/// WeatherVariable::ALL + 1)`.
///
/// # Example
///
/// ```
/// use test_utils::cell_value;
/// use weather_common::WeatherVariable;
///
/// assert_eq!(cell_value(WeatherVariable::Temperature, 0, 0, 0), 1_000_000.0);
/// assert_eq!(cell_value(WeatherVariable::Temperature, 2, 3, 4), 1_020_304.0);
/// ```
pub fn cell_value(variable: WeatherVariable, t: usize, lat: usize, lon: usize) -> f64 {
    let offset = WeatherVariable::ALL
        .iter()
        .position(|v| *v == variable)
        .map(|p| (p + 1) * 1_000_000)
        .unwrap_or(0);
    (offset + t * 10_000 + lat * 100 + lon) as f64
}

/// Creates a regularly spaced axis.
///
/// # Example
///
/// ```
/// use test_utils::create_axis;
///
/// assert_eq!(create_axis(30.0, 2.0, 3), vec![30.0, 32.0, 34.0]);
/// ```
pub fn create_axis(start: f64, step: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| start + step * i as f64).collect()
}

/// Creates an hourly time axis starting at `start`.
pub fn create_hourly_times(start: DateTime<Utc>, len: usize) -> Vec<DateTime<Utc>> {
    (0..len)
        .map(|h| start + Duration::hours(h as i64))
        .collect()
}

/// Creates the values of one variable over a `[time, lat, lon]` grid using
/// [`cell_value`], in row-major order.
pub fn create_variable_values(
    variable: WeatherVariable,
    nt: usize,
    nlat: usize,
    nlon: usize,
) -> Vec<f64> {
    let mut data = Vec::with_capacity(nt * nlat * nlon);
    for t in 0..nt {
        for lat in 0..nlat {
            for lon in 0..nlon {
                data.push(cell_value(variable, t, lat, lon));
            }
        }
    }
    data
}

/// Shape and coverage of a generated cube.
#[derive(Debug, Clone)]
pub struct CubeSpec {
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub time: Vec<DateTime<Utc>>,
    pub variables: Vec<WeatherVariable>,
}

impl Default for CubeSpec {
    /// 6 x 6 grid at 2 degree spacing over the US west coast, 24 hourly
    /// samples from 2024-01-01T00:00Z, every variable present.
    fn default() -> Self {
        Self {
            latitude: create_axis(30.0, 2.0, 6),
            longitude: create_axis(-126.0, 2.0, 6),
            time: create_hourly_times(test_epoch(), 24),
            variables: WeatherVariable::ALL.to_vec(),
        }
    }
}

impl CubeSpec {
    pub fn with_variables(mut self, variables: &[WeatherVariable]) -> Self {
        self.variables = variables.to_vec();
        self
    }

    pub fn with_hours(mut self, hours: usize) -> Self {
        self.time = create_hourly_times(test_epoch(), hours);
        self
    }

    /// Build the in-memory snapshot.
    pub fn snapshot(&self) -> CubeSnapshot {
        let (nt, nlat, nlon) = (self.time.len(), self.latitude.len(), self.longitude.len());
        let variables: BTreeMap<_, _> = self
            .variables
            .iter()
            .map(|v| (*v, create_variable_values(*v, nt, nlat, nlon)))
            .collect();

        CubeSnapshot {
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
            time: self.time.clone(),
            variables,
        }
    }
}

/// First time sample of generated cubes.
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_values_are_distinct_per_variable() {
        let a = cell_value(WeatherVariable::Temperature, 1, 2, 3);
        let b = cell_value(WeatherVariable::Pressure, 1, 2, 3);
        assert_ne!(a, b);
        assert_eq!(a, 1_010_203.0);
    }

    #[test]
    fn test_default_snapshot_is_valid() {
        let snapshot = CubeSpec::default().snapshot();
        assert!(snapshot.validate().is_ok());
        assert_eq!(snapshot.shape(), [24, 6, 6]);
        assert_eq!(
            snapshot.value(WeatherVariable::Humidity, 5, 4, 3),
            Some(cell_value(WeatherVariable::Humidity, 5, 4, 3))
        );
    }

    #[test]
    fn test_hourly_times() {
        let times = create_hourly_times(test_epoch(), 3);
        assert_eq!(times[2] - times[0], Duration::hours(2));
    }
}
