//! Zarr writer for data cube snapshots.
//!
//! Writes a group laid out the way [`crate::ZarrDataCube`] reads it:
//!
//! ```text
//! <root>/
//!   latitude   float64 [lat]
//!   longitude  float64 [lon]
//!   time       int64   [time]   units = "seconds since 1970-01-01T00:00:00Z"
//!   <variable> float64 [time, lat, lon]  _ARRAY_DIMENSIONS = ["time", "latitude", "longitude"]
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, instrument};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};

use weather_common::{CatalogError, Coordinate, Result};

use crate::axis::TimeUnits;
use crate::config::{CubeWriterConfig, ZarrCompression};
use crate::cube::{storage_name, CubeSnapshot, VariableRenameMap};
use crate::zarr::{join_node_path, normalize_root, DIMENSIONS_ATTRIBUTE};

/// Result of writing a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeWriteResult {
    /// Node path of the written group.
    pub root: String,
    /// Number of arrays written, coordinates included.
    pub arrays_written: usize,
    /// Uncompressed bytes of element data written.
    pub bytes_written: u64,
}

/// Writer for creating Zarr groups from cube snapshots.
#[derive(Debug, Clone)]
pub struct ZarrCubeWriter {
    config: CubeWriterConfig,
}

impl Default for ZarrCubeWriter {
    fn default() -> Self {
        Self::new(CubeWriterConfig::default())
    }
}

impl ZarrCubeWriter {
    pub fn new(config: CubeWriterConfig) -> Self {
        Self { config }
    }

    /// Write a snapshot as a Zarr group at `root`.
    ///
    /// Variable arrays are named through `rename_map`, falling back to the
    /// canonical variable name when the map is absent or empty.
    #[instrument(skip(self, storage, snapshot, rename_map), fields(root = %root))]
    pub fn write<S>(
        &self,
        storage: Arc<S>,
        root: &str,
        snapshot: &CubeSnapshot,
        rename_map: Option<&VariableRenameMap>,
    ) -> Result<CubeWriteResult>
    where
        S: ReadableStorageTraits + WritableStorageTraits + 'static,
    {
        self.config.validate().map_err(CatalogError::configuration)?;
        snapshot.validate()?;

        // Resolve every name first so a bad rename map writes nothing.
        let variables = snapshot
            .variables
            .iter()
            .map(|(variable, values)| {
                storage_name(rename_map, *variable).map(|name| (name, *variable, values))
            })
            .collect::<Result<Vec<_>>>()?;

        let root = normalize_root(root);
        let group = GroupBuilder::new()
            .build(storage.clone(), &root)
            .map_err(|e| write_failed(&root, e))?;
        group.store_metadata().map_err(|e| write_failed(&root, e))?;

        let [nt, nlat, nlon] = snapshot.shape();
        let mut bytes_written = 0u64;

        let lat_attrs = coordinate_attributes(Coordinate::Latitude, "degrees_north");
        let lat = self.build_array(
            &storage,
            &root,
            "latitude",
            vec![nlat as u64],
            DataType::Float64,
            lat_attrs,
        )?;
        bytes_written += store_all(&lat, &snapshot.latitude)?;

        let lon_attrs = coordinate_attributes(Coordinate::Longitude, "degrees_east");
        let lon = self.build_array(
            &storage,
            &root,
            "longitude",
            vec![nlon as u64],
            DataType::Float64,
            lon_attrs,
        )?;
        bytes_written += store_all(&lon, &snapshot.longitude)?;

        let seconds: Vec<i64> = snapshot.time.iter().map(|t| t.timestamp()).collect();
        let time_attrs = coordinate_attributes(Coordinate::Time, TimeUnits::UNIX_SECONDS);
        let time = self.build_array(
            &storage,
            &root,
            "time",
            vec![nt as u64],
            DataType::Int64,
            time_attrs,
        )?;
        bytes_written += store_all(&time, &seconds)?;

        for (name, variable, values) in &variables {
            let mut attrs = serde_json::Map::new();
            attrs.insert(
                DIMENSIONS_ATTRIBUTE.to_string(),
                json!(["time", "latitude", "longitude"]),
            );
            attrs.insert("long_name".to_string(), json!(variable.as_str()));

            let array = self.build_array(
                &storage,
                &root,
                name,
                vec![nt as u64, nlat as u64, nlon as u64],
                DataType::Float64,
                attrs,
            )?;
            bytes_written += store_all(&array, values.as_slice())?;
            debug!(array = %name, variable = %variable, "Wrote variable array");
        }

        Ok(CubeWriteResult {
            root,
            arrays_written: variables.len() + 3,
            bytes_written,
        })
    }

    /// Build a Zarr array with the configured chunking and compression.
    fn build_array<S>(
        &self,
        storage: &Arc<S>,
        root: &str,
        name: &str,
        shape: Vec<u64>,
        data_type: DataType,
        attrs: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Array<S>>
    where
        S: ReadableStorageTraits + WritableStorageTraits + 'static,
    {
        let path = join_node_path(root, name);

        let chunk_shape: Vec<u64> = if shape.len() == 3 {
            vec![
                shape[0].min(self.config.time_chunk as u64).max(1),
                shape[1].min(self.config.spatial_chunk as u64).max(1),
                shape[2].min(self.config.spatial_chunk as u64).max(1),
            ]
        } else {
            shape.iter().map(|len| (*len).max(1)).collect()
        };

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| CatalogError::configuration(format!("{:?}", e)))?;

        let fill_value = match data_type {
            DataType::Int64 => FillValue::from(0i64),
            _ => FillValue::from(f64::NAN),
        };

        let mut binding = ArrayBuilder::new(shape, data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(attrs);

        if self.config.compression != ZarrCompression::None {
            builder = builder.bytes_to_bytes_codecs(vec![self.create_compression_codec()?]);
        }

        let array = builder
            .build(storage.clone(), &path)
            .map_err(|e| write_failed(&path, e))?;
        array.store_metadata().map_err(|e| write_failed(&path, e))?;
        Ok(array)
    }

    /// Create the compression codec based on configuration.
    fn create_compression_codec(
        &self,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| CatalogError::configuration("invalid compression level"))?;

        let shuffle = if self.config.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // All arrays written here hold 8-byte elements.
        let typesize = if self.config.shuffle { Some(8) } else { None };

        let compressor = match self.config.compression {
            ZarrCompression::None => {
                return Err(CatalogError::configuration("no compression configured"))
            }
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| CatalogError::configuration(e.to_string()))?;

        Ok(Arc::new(codec))
    }
}

fn coordinate_attributes(
    coordinate: Coordinate,
    units: &str,
) -> serde_json::Map<String, serde_json::Value> {
    let mut attrs = serde_json::Map::new();
    attrs.insert(DIMENSIONS_ATTRIBUTE.to_string(), json!([coordinate.as_str()]));
    attrs.insert("units".to_string(), json!(units));
    attrs
}

fn store_all<S, T>(array: &Array<S>, values: &[T]) -> Result<u64>
where
    S: ReadableStorageTraits + WritableStorageTraits + 'static,
    T: zarrs::array::Element,
{
    let shape = array.shape().to_vec();
    let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)
        .map_err(|e| CatalogError::data_access(e.to_string()))?;
    array
        .store_array_subset_elements(&subset, values)
        .map_err(|e| write_failed(array.path().as_str(), e))?;
    Ok(std::mem::size_of_val(values) as u64)
}

fn write_failed(path: &str, err: impl std::fmt::Display) -> CatalogError {
    CatalogError::data_access(format!("failed to write {}: {}", path, err))
}
