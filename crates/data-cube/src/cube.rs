//! Data cube trait and shared types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use weather_common::{CatalogError, Result, WeatherVariable};

use crate::table::Table;

/// Mapping from weather variables to storage-native array names.
pub type VariableRenameMap = BTreeMap<WeatherVariable, String>;

/// Resolve the storage name of a variable.
///
/// Without a map (or with an empty one) the variable's canonical name is
/// used. A non-empty map must contain the variable.
pub fn storage_name(
    rename_map: Option<&VariableRenameMap>,
    variable: WeatherVariable,
) -> Result<String> {
    match rename_map {
        Some(map) if !map.is_empty() => map.get(&variable).cloned().ok_or_else(|| {
            CatalogError::unsupported_query(format!(
                "variable '{}' is not available in this dataset",
                variable
            ))
        }),
        _ => Ok(variable.as_str().to_string()),
    }
}

/// A point time-series extraction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSeriesRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub variables: Vec<WeatherVariable>,
}

/// Handle to a chunked N-dimensional dataset.
///
/// Implementations own their storage handle; nothing is mutated after
/// construction.
pub trait DataCube: Send + Sync {
    /// Extract a time series for one location and a set of variables.
    ///
    /// Latitude and longitude snap to the nearest grid point, and the time
    /// range snaps to the nearest samples, inclusive. Columns are named by
    /// the canonical variable name.
    fn get_data(&self, request: &PointSeriesRequest) -> Result<Table>;

    /// Read the whole dataset into memory.
    fn snapshot(&self) -> Result<CubeSnapshot>;

    /// Variable rename map, if the dataset uses non-canonical names.
    fn rename_map(&self) -> Option<&VariableRenameMap>;
}

/// Fully materialized cube contents.
///
/// Variable values are laid out `[time, latitude, longitude]` in row-major
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeSnapshot {
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub time: Vec<DateTime<Utc>>,
    pub variables: BTreeMap<WeatherVariable, Vec<f64>>,
}

impl CubeSnapshot {
    /// `[time, latitude, longitude]` lengths.
    pub fn shape(&self) -> [usize; 3] {
        [self.time.len(), self.latitude.len(), self.longitude.len()]
    }

    /// Check axis lengths and variable sizes.
    pub fn validate(&self) -> Result<()> {
        let [nt, nlat, nlon] = self.shape();
        if nt == 0 || nlat == 0 || nlon == 0 {
            return Err(CatalogError::data_access(format!(
                "cube axes must be non-empty, got shape [{}, {}, {}]",
                nt, nlat, nlon
            )));
        }

        let expected = nt * nlat * nlon;
        for (variable, values) in &self.variables {
            if values.len() != expected {
                return Err(CatalogError::data_access(format!(
                    "variable '{}' has {} values, expected {}",
                    variable,
                    values.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Value at `(time, lat, lon)` indices.
    pub fn value(
        &self,
        variable: WeatherVariable,
        time: usize,
        lat: usize,
        lon: usize,
    ) -> Option<f64> {
        let [_, nlat, nlon] = self.shape();
        self.variables
            .get(&variable)
            .and_then(|values| values.get((time * nlat + lat) * nlon + lon))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_storage_name_without_map() {
        assert_eq!(
            storage_name(None, WeatherVariable::WindU).unwrap(),
            "wind_u"
        );
        let empty = VariableRenameMap::new();
        assert_eq!(
            storage_name(Some(&empty), WeatherVariable::Pressure).unwrap(),
            "pressure"
        );
    }

    #[test]
    fn test_storage_name_with_map() {
        let map: VariableRenameMap = [(WeatherVariable::Temperature, "t2m".to_string())]
            .into_iter()
            .collect();
        assert_eq!(
            storage_name(Some(&map), WeatherVariable::Temperature).unwrap(),
            "t2m"
        );
        assert!(matches!(
            storage_name(Some(&map), WeatherVariable::Humidity),
            Err(CatalogError::UnsupportedQuery(_))
        ));
    }

    #[test]
    fn test_snapshot_validate_and_index() {
        let time = vec![Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(); 2];
        let mut snapshot = CubeSnapshot {
            latitude: vec![0.0, 1.0],
            longitude: vec![0.0, 1.0, 2.0],
            time,
            variables: BTreeMap::new(),
        };
        snapshot
            .variables
            .insert(WeatherVariable::Pressure, (0..12).map(f64::from).collect());
        assert!(snapshot.validate().is_ok());
        assert_eq!(snapshot.value(WeatherVariable::Pressure, 1, 1, 2), Some(11.0));
        assert_eq!(snapshot.value(WeatherVariable::Pressure, 0, 1, 0), Some(3.0));

        snapshot
            .variables
            .insert(WeatherVariable::Humidity, vec![0.0; 5]);
        assert!(snapshot.validate().is_err());
    }
}
