//! Zarr-backed data cube.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::node::{node_exists, NodePath};
use zarrs::storage::{ListableStorageTraits, ReadableStorageTraits};

use weather_common::{CatalogError, Coordinate, Result, WeatherVariable};

use crate::axis::{nearest_index, time_range_indices, TimeUnits};
use crate::cube::{storage_name, CubeSnapshot, DataCube, PointSeriesRequest, VariableRenameMap};
use crate::table::Table;

/// Attribute holding the dimension names of an array (xarray convention).
pub const DIMENSIONS_ATTRIBUTE: &str = "_ARRAY_DIMENSIONS";

/// Dimension order assumed when an array carries no dimension names.
pub const DEFAULT_DIMENSIONS: [Coordinate; 3] =
    [Coordinate::Time, Coordinate::Latitude, Coordinate::Longitude];

/// Join a group path and a child name into a Zarr node path.
pub fn join_node_path(root: &str, name: &str) -> String {
    let root = root.trim_end_matches('/');
    format!("{}/{}", root, name.trim_start_matches('/'))
}

/// Normalize a dataset root into an absolute node path without a trailing slash.
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Data cube over a Zarr group holding `latitude`, `longitude` and `time`
/// coordinate arrays plus one array per variable.
///
/// Only the `[time range, lat, lon]` slice a request needs is read; the
/// coordinate axes are read in full to find the nearest indices.
pub struct ZarrDataCube<S: ?Sized> {
    storage: Arc<S>,
    /// Node path of the dataset group.
    root: String,
    rename_map: Option<VariableRenameMap>,
}

impl<S> ZarrDataCube<S>
where
    S: ?Sized + ReadableStorageTraits + ListableStorageTraits + Send + Sync + 'static,
{
    /// Open the dataset group at `root` within `storage`.
    ///
    /// Fails with a data access error if no Zarr node exists there.
    pub fn open(
        storage: Arc<S>,
        root: &str,
        rename_map: Option<VariableRenameMap>,
    ) -> Result<Self> {
        let root = normalize_root(root);
        let node_path = NodePath::new(&root)
            .map_err(|e| CatalogError::data_access(format!("invalid dataset path {}: {}", root, e)))?;

        let exists = node_exists(&storage, &node_path)
            .map_err(|e| CatalogError::data_access(format!("failed to probe {}: {}", root, e)))?;
        if !exists {
            return Err(CatalogError::data_access(format!(
                "no Zarr dataset at {}",
                root
            )));
        }

        Ok(Self {
            storage,
            root,
            rename_map,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn open_array(&self, name: &str) -> Result<Array<S>> {
        let path = join_node_path(&self.root, name);
        Array::open(self.storage.clone(), &path)
            .map_err(|e| CatalogError::data_access(format!("failed to open array {}: {}", path, e)))
    }

    fn array_exists(&self, name: &str) -> Result<bool> {
        let path = join_node_path(&self.root, name);
        let node_path = NodePath::new(&path)
            .map_err(|e| CatalogError::data_access(format!("invalid array path {}: {}", path, e)))?;
        node_exists(&self.storage, &node_path)
            .map_err(|e| CatalogError::data_access(format!("failed to probe {}: {}", path, e)))
    }

    /// Read a full 1-D coordinate axis.
    fn read_axis(&self, coordinate: Coordinate) -> Result<Vec<f64>> {
        let array = self.open_array(coordinate.as_str())?;
        if array.shape().len() != 1 {
            return Err(CatalogError::data_access(format!(
                "coordinate '{}' must be 1-D, got shape {:?}",
                coordinate,
                array.shape()
            )));
        }
        read_all(&array)
    }

    /// Read and decode the time axis.
    fn read_time_axis(&self) -> Result<Vec<DateTime<Utc>>> {
        let array = self.open_array(Coordinate::Time.as_str())?;
        let units = match array.attributes().get("units").and_then(|v| v.as_str()) {
            Some(units) => TimeUnits::parse(units)?,
            None => TimeUnits::default(),
        };

        let raw = match array.data_type() {
            // Integer offsets are decoded exactly.
            DataType::Int64 => array
                .retrieve_array_subset_elements::<i64>(&full_subset(&array)?)
                .map_err(|e| read_failed(Coordinate::Time.as_str(), e))?
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            _ => read_all(&array)?,
        };

        raw.into_iter().map(|offset| units.decode(offset)).collect()
    }

    fn nearest(&self, coordinate: Coordinate, axis: &[f64], value: f64) -> Result<usize> {
        nearest_index(axis, value).ok_or_else(|| {
            CatalogError::data_access(format!(
                "coordinate '{}' in {} has no usable values",
                coordinate, self.root
            ))
        })
    }

    /// Open a variable array and check it against the coordinate axes.
    fn open_variable(&self, name: &str, shape: [usize; 3]) -> Result<(Array<S>, [Coordinate; 3])> {
        let array = self.open_array(name)?;
        let dims = dimension_order(&array)?;

        if array.shape().len() != 3 {
            return Err(CatalogError::data_access(format!(
                "variable '{}' must be 3-D, got shape {:?}",
                name,
                array.shape()
            )));
        }
        for (pos, dim) in dims.iter().enumerate() {
            let expected = shape[axis_slot(*dim)] as u64;
            if array.shape()[pos] != expected {
                return Err(CatalogError::data_access(format!(
                    "variable '{}' has {} samples along '{}', coordinate has {}",
                    name,
                    array.shape()[pos],
                    dim,
                    expected
                )));
            }
        }
        Ok((array, dims))
    }
}

impl<S> DataCube for ZarrDataCube<S>
where
    S: ?Sized + ReadableStorageTraits + ListableStorageTraits + Send + Sync + 'static,
{
    #[instrument(skip(self, request), fields(root = %self.root))]
    fn get_data(&self, request: &PointSeriesRequest) -> Result<Table> {
        // Resolve names before touching storage.
        let names = request
            .variables
            .iter()
            .map(|v| storage_name(self.rename_map.as_ref(), *v).map(|name| (*v, name)))
            .collect::<Result<Vec<_>>>()?;

        let latitude = self.read_axis(Coordinate::Latitude)?;
        let longitude = self.read_axis(Coordinate::Longitude)?;
        let time = self.read_time_axis()?;

        let lat_idx = self.nearest(Coordinate::Latitude, &latitude, request.latitude)?;
        let lon_idx = self.nearest(Coordinate::Longitude, &longitude, request.longitude)?;
        let (first, last) = time_range_indices(&time, request.start_date, request.end_date)
            .ok_or_else(|| {
                CatalogError::data_access(format!("time axis in {} is empty", self.root))
            })?;

        debug!(
            lat_idx,
            lon_idx,
            nearest_lat = latitude[lat_idx],
            nearest_lon = longitude[lon_idx],
            first,
            last,
            "Resolved cube indices"
        );

        let shape = [time.len(), latitude.len(), longitude.len()];
        let mut table = Table::new(time[first..=last].to_vec());

        for (variable, name) in names {
            let (array, dims) = self.open_variable(&name, shape)?;

            let mut start = vec![0u64; 3];
            let mut count = vec![1u64; 3];
            for (pos, dim) in dims.iter().enumerate() {
                match dim {
                    Coordinate::Time => {
                        start[pos] = first as u64;
                        count[pos] = (last - first + 1) as u64;
                    }
                    Coordinate::Latitude => start[pos] = lat_idx as u64,
                    Coordinate::Longitude => start[pos] = lon_idx as u64,
                }
            }

            let subset = ArraySubset::new_with_start_shape(start, count)
                .map_err(|e| read_failed(&name, e))?;
            let values = read_subset(&array, &subset, &name)?;
            table.push_column(variable.as_str(), values)?;
        }

        Ok(table)
    }

    #[instrument(skip(self), fields(root = %self.root))]
    fn snapshot(&self) -> Result<CubeSnapshot> {
        let latitude = self.read_axis(Coordinate::Latitude)?;
        let longitude = self.read_axis(Coordinate::Longitude)?;
        let time = self.read_time_axis()?;
        let shape = [time.len(), latitude.len(), longitude.len()];

        let mut snapshot = CubeSnapshot {
            latitude,
            longitude,
            time,
            variables: Default::default(),
        };

        for variable in WeatherVariable::ALL {
            let Ok(name) = storage_name(self.rename_map.as_ref(), variable) else {
                continue;
            };
            if !self.array_exists(&name)? {
                continue;
            }

            let (array, dims) = self.open_variable(&name, shape)?;
            let values = read_subset(&array, &full_subset(&array)?, &name)?;
            snapshot
                .variables
                .insert(variable, reorder_to_canonical(&values, dims, shape));
        }

        debug!(variables = snapshot.variables.len(), "Read cube snapshot");
        Ok(snapshot)
    }

    fn rename_map(&self) -> Option<&VariableRenameMap> {
        self.rename_map.as_ref()
    }
}

fn read_failed(name: &str, err: impl std::fmt::Display) -> CatalogError {
    CatalogError::data_access(format!("failed to read '{}': {}", name, err))
}

fn full_subset<S: ?Sized>(array: &Array<S>) -> Result<ArraySubset> {
    let shape = array.shape().to_vec();
    ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)
        .map_err(|e| CatalogError::data_access(e.to_string()))
}

fn read_all<S>(array: &Array<S>) -> Result<Vec<f64>>
where
    S: ?Sized + ReadableStorageTraits + 'static,
{
    let subset = full_subset(array)?;
    read_subset(array, &subset, array.path().as_str())
}

/// Read a subset as f64 regardless of the stored numeric type.
fn read_subset<S>(array: &Array<S>, subset: &ArraySubset, name: &str) -> Result<Vec<f64>>
where
    S: ?Sized + ReadableStorageTraits + 'static,
{
    let values = match array.data_type() {
        DataType::Float64 => array
            .retrieve_array_subset_elements::<f64>(subset)
            .map_err(|e| read_failed(name, e))?,
        DataType::Float32 => array
            .retrieve_array_subset_elements::<f32>(subset)
            .map_err(|e| read_failed(name, e))?
            .into_iter()
            .map(f64::from)
            .collect(),
        DataType::Int64 => array
            .retrieve_array_subset_elements::<i64>(subset)
            .map_err(|e| read_failed(name, e))?
            .into_iter()
            .map(|v| v as f64)
            .collect(),
        DataType::Int32 => array
            .retrieve_array_subset_elements::<i32>(subset)
            .map_err(|e| read_failed(name, e))?
            .into_iter()
            .map(f64::from)
            .collect(),
        other => {
            return Err(CatalogError::data_access(format!(
                "array '{}' has unsupported data type {:?}",
                name, other
            )))
        }
    };
    Ok(values)
}

/// Dimension order of a variable array, from its attributes.
fn dimension_order<S: ?Sized>(array: &Array<S>) -> Result<[Coordinate; 3]> {
    let Some(names) = array
        .attributes()
        .get(DIMENSIONS_ATTRIBUTE)
        .and_then(|v| v.as_array())
    else {
        return Ok(DEFAULT_DIMENSIONS);
    };

    let dims = names
        .iter()
        .map(|name| name.as_str().and_then(Coordinate::from_dimension_name))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            CatalogError::data_access(format!(
                "unrecognized dimensions {:?} on {}",
                names,
                array.path().as_str()
            ))
        })?;

    match dims.as_slice() {
        [a, b, c] if a != b && b != c && a != c => Ok([*a, *b, *c]),
        _ => Err(CatalogError::data_access(format!(
            "expected time, latitude and longitude dimensions on {}, got {:?}",
            array.path().as_str(),
            names
        ))),
    }
}

/// Position of a coordinate in `[time, latitude, longitude]`.
fn axis_slot(coordinate: Coordinate) -> usize {
    match coordinate {
        Coordinate::Time => 0,
        Coordinate::Latitude => 1,
        Coordinate::Longitude => 2,
    }
}

/// Reorder row-major values stored with `dims` into `[time, latitude, longitude]`.
fn reorder_to_canonical(values: &[f64], dims: [Coordinate; 3], shape: [usize; 3]) -> Vec<f64> {
    if dims == DEFAULT_DIMENSIONS {
        return values.to_vec();
    }

    let stored = dims.map(|d| shape[axis_slot(d)]);
    let mut out = Vec::with_capacity(values.len());
    for t in 0..shape[0] {
        for lat in 0..shape[1] {
            for lon in 0..shape[2] {
                let canonical = [t, lat, lon];
                let idx = dims.map(|d| canonical[axis_slot(d)]);
                out.push(values[(idx[0] * stored[1] + idx[1]) * stored[2] + idx[2]]);
            }
        }
    }
    out
}
