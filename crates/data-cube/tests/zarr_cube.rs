//! Integration tests for reading, writing and resolving Zarr data cubes.

use std::sync::Arc;

use chrono::Duration;
use data_cube::{
    CubeWriterConfig, DataCube, PointSeriesRequest, QueryResolver, VariableRenameMap,
    ZarrCompression, ZarrCubeWriter, ZarrDataCube,
};
use tempfile::TempDir;
use test_utils::{
    assert_approx_eq, cell_value, era5_rename_map, locations, model, sample_params, test_epoch,
    CubeSpec, SampleDataset,
};
use weather_common::{CatalogError, Query, WeatherVariable};
use zarrs_filesystem::FilesystemStore;

fn open_era5(dataset: &SampleDataset) -> ZarrDataCube<FilesystemStore> {
    let store = FilesystemStore::new(dataset.dataset_path(model::GROUP, model::ID)).unwrap();
    ZarrDataCube::open(Arc::new(store), "/", Some(era5_rename_map())).unwrap()
}

#[test]
fn test_resolve_point_query_with_rename_map() {
    let dataset = SampleDataset::era5().unwrap();
    let cube = open_era5(&dataset);

    let mut params = sample_params();
    params.insert("location.latitude".into(), 37.0.into());
    params.insert("location.longitude".into(), (-122.0).into());
    let query = Query::from_params(&params).unwrap();

    let table = QueryResolver::new().resolve(&query, &cube).unwrap();

    // Hours 0..=5; latitude 37 is equidistant from 36 and 38 and takes the
    // lower index, longitude -122 is on the grid.
    assert_eq!(table.column_names(), vec!["temperature"]);
    assert_eq!(table.num_rows(), 6);
    let column = table.column("temperature").unwrap();
    for (t, value) in column.values.iter().enumerate() {
        assert_approx_eq!(*value, cell_value(WeatherVariable::Temperature, t, 3, 2), 1e-9);
    }
}

#[test]
fn test_time_range_snaps_to_nearest_samples() {
    let dataset = SampleDataset::era5().unwrap();
    let cube = open_era5(&dataset);
    let (lat, lon) = locations::GRID_ORIGIN;

    let request = PointSeriesRequest {
        latitude: lat,
        longitude: lon,
        start_date: test_epoch() + Duration::minutes(100),
        end_date: test_epoch() + Duration::minutes(200),
        variables: vec![WeatherVariable::WindU, WeatherVariable::WindV],
    };
    let table = cube.get_data(&request).unwrap();

    // 01:40 snaps to 02:00, 03:20 snaps to 03:00.
    assert_eq!(
        table.time,
        vec![test_epoch() + Duration::hours(2), test_epoch() + Duration::hours(3)]
    );
    assert_eq!(table.column_names(), vec!["wind_u", "wind_v"]);
    assert_eq!(
        table.column("wind_v").unwrap().values,
        vec![
            cell_value(WeatherVariable::WindV, 2, 0, 0),
            cell_value(WeatherVariable::WindV, 3, 0, 0)
        ]
    );
}

#[test]
fn test_point_outside_grid_snaps_to_edge() {
    let dataset = SampleDataset::era5().unwrap();
    let cube = open_era5(&dataset);
    let (lat, lon) = locations::FAR_NORTH_EAST;

    let request = PointSeriesRequest {
        latitude: lat,
        longitude: lon,
        start_date: test_epoch(),
        end_date: test_epoch(),
        variables: vec![WeatherVariable::Temperature],
    };
    let table = cube.get_data(&request).unwrap();
    assert_eq!(
        table.column("temperature").unwrap().values,
        vec![cell_value(WeatherVariable::Temperature, 0, 5, 5)]
    );
}

#[test]
fn test_missing_rename_entry_is_unsupported() {
    let dataset = SampleDataset::era5().unwrap();
    let cube = open_era5(&dataset);

    let mut params = sample_params();
    params.insert("variable".into(), "humidity".into());
    let query = Query::from_params(&params).unwrap();

    let err = QueryResolver::new().resolve(&query, &cube).unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedQuery(_)));
}

#[test]
fn test_open_missing_dataset_is_data_access_error() {
    let dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(dir.path()).unwrap();
    let result = ZarrDataCube::open(Arc::new(store), "/era5/missing.zarr", None);
    assert!(matches!(result, Err(CatalogError::DataAccess(_))));
}

#[test]
fn test_snapshot_round_trip_without_compression() {
    let dir = TempDir::new().unwrap();
    let spec = CubeSpec::default()
        .with_hours(5)
        .with_variables(&[WeatherVariable::Pressure, WeatherVariable::Humidity]);
    let expected = spec.snapshot();

    let config = CubeWriterConfig {
        time_chunk: 2,
        spatial_chunk: 4,
        compression: ZarrCompression::None,
        ..Default::default()
    };
    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let result = ZarrCubeWriter::new(config)
        .write(store.clone(), "/cube", &expected, None)
        .unwrap();
    assert_eq!(result.root, "/cube");
    assert_eq!(result.arrays_written, 5);

    let cube = ZarrDataCube::open(store, "/cube", None).unwrap();
    assert_eq!(cube.snapshot().unwrap(), expected);
}

#[test]
fn test_snapshot_reads_renamed_variables_back() {
    let dataset = SampleDataset::era5().unwrap();
    let cube = open_era5(&dataset);

    let snapshot = cube.snapshot().unwrap();
    assert_eq!(snapshot.variables.len(), 3);
    assert_eq!(
        snapshot.value(WeatherVariable::WindU, 7, 1, 4),
        Some(cell_value(WeatherVariable::WindU, 7, 1, 4))
    );
}

#[test]
fn test_writer_rejects_incomplete_rename_map() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let snapshot = CubeSpec::default()
        .with_variables(&[WeatherVariable::Pressure])
        .snapshot();
    let rename: VariableRenameMap = era5_rename_map();

    let err = ZarrCubeWriter::default()
        .write(store, "/", &snapshot, Some(&rename))
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedQuery(_)));
    assert!(!dir.path().join("zarr.json").exists());
}
