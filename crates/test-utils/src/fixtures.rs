//! Common test fixtures for weather catalog tests.
//!
//! This module provides pre-defined queries, parameters and on-disk Zarr
//! datasets matching the layout the catalogs read.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use data_cube::{VariableRenameMap, ZarrCubeWriter};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use weather_common::{Result, WeatherVariable};
use zarrs_filesystem::FilesystemStore;

use crate::generators::CubeSpec;

/// Model group and id used by the fixture datasets.
pub mod model {
    pub const GROUP: &str = "era5";
    pub const ID: &str = "reanalysis";
}

/// Locations relative to the default [`CubeSpec`] grid
/// (latitude 30..40, longitude -126..-116, 2 degree spacing).
pub mod locations {
    /// Off-grid point; nearest cell is latitude 36 (index 3), longitude -122 (index 2).
    pub const SAN_FRANCISCO: (f64, f64) = (37.0, -122.4);

    /// Exactly on the grid at index (0, 0).
    pub const GRID_ORIGIN: (f64, f64) = (30.0, -126.0);

    /// Far outside the grid; snaps to the last latitude and longitude.
    pub const FAR_NORTH_EAST: (f64, f64) = (80.0, 10.0);
}

/// Flat orchestrator parameters for a point query over the fixture dataset.
pub fn sample_params() -> Map<String, Value> {
    let Value::Object(map) = json!({
        "start_date": "2024-01-01T00:00:00Z",
        "end_date": "2024-01-01T05:00:00Z",
        "frequency": "hourly",
        "location.latitude": locations::SAN_FRANCISCO.0,
        "location.longitude": locations::SAN_FRANCISCO.1,
        "weather_model_group": model::GROUP,
        "weather_model_id": model::ID,
        "resolution": "25km",
        "variable": "temperature",
    }) else {
        unreachable!("object literal")
    };
    map
}

/// Rename map used by the local catalog and by ERA5-style datasets.
pub fn era5_rename_map() -> VariableRenameMap {
    [
        (WeatherVariable::Temperature, "t2m".to_string()),
        (WeatherVariable::WindU, "u10m".to_string()),
        (WeatherVariable::WindV, "v10m".to_string()),
    ]
    .into_iter()
    .collect()
}

/// A Zarr dataset written into a temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct SampleDataset {
    dir: TempDir,
    pub spec: CubeSpec,
}

impl SampleDataset {
    /// Write `spec` at `<tmp>/<group>/<id>.zarr`, naming variable arrays
    /// through `rename_map`.
    pub fn create(
        spec: CubeSpec,
        group: &str,
        id: &str,
        rename_map: Option<&VariableRenameMap>,
    ) -> Result<Self> {
        let dir = TempDir::new()?;
        write_dataset(dir.path(), group, id, &spec, rename_map)?;
        Ok(Self { dir, spec })
    }

    /// The ERA5-style fixture: temperature and winds stored as
    /// `t2m`/`u10m`/`v10m` under [`model::GROUP`]/[`model::ID`].
    pub fn era5() -> Result<Self> {
        let spec = CubeSpec::default().with_variables(&[
            WeatherVariable::Temperature,
            WeatherVariable::WindU,
            WeatherVariable::WindV,
        ]);
        Self::create(spec, model::GROUP, model::ID, Some(&era5_rename_map()))
    }

    /// Catalog base path holding the dataset.
    pub fn base_path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory of the dataset itself.
    pub fn dataset_path(&self, group: &str, id: &str) -> PathBuf {
        self.dir.path().join(group).join(format!("{}.zarr", id))
    }
}

/// Write a generated cube under `base` in the catalog layout.
pub fn write_dataset(
    base: &Path,
    group: &str,
    id: &str,
    spec: &CubeSpec,
    rename_map: Option<&VariableRenameMap>,
) -> Result<PathBuf> {
    let path = base.join(group).join(format!("{}.zarr", id));
    std::fs::create_dir_all(&path)?;

    let store = FilesystemStore::new(&path)
        .map_err(|e| weather_common::CatalogError::data_access(e.to_string()))?;
    ZarrCubeWriter::default().write(Arc::new(store), "/", &spec.snapshot(), rename_map)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_params_build_a_query() {
        let query = weather_common::Query::from_params(&sample_params()).unwrap();
        assert_eq!(query.weather_model_group(), model::GROUP);
        assert_eq!(query.variable(), WeatherVariable::Temperature);
    }

    #[test]
    fn test_era5_dataset_layout() {
        let dataset = SampleDataset::era5().unwrap();
        let path = dataset.dataset_path(model::GROUP, model::ID);
        assert!(path.join("zarr.json").exists());
        assert!(path.join("t2m").join("zarr.json").exists());
        assert!(path.join("time").join("zarr.json").exists());
        assert!(!path.join("temperature").exists());
    }
}
