//! Data cubes over chunked Zarr storage.
//!
//! A [`DataCube`] answers point time-series requests: the latitude and
//! longitude snap to the nearest grid point and the time range snaps to the
//! nearest samples. [`ZarrDataCube`] reads only the slice a request needs.
//! [`ZarrCubeWriter`] writes a [`CubeSnapshot`] back out in the layout the
//! reader expects, and [`QueryResolver`] maps a [`weather_common::Query`]
//! onto a cube read.

pub mod axis;
pub mod config;
pub mod cube;
pub mod resolver;
pub mod table;
pub mod writer;
pub mod zarr;

pub use axis::{nearest_index, nearest_time_index, time_range_indices, TimeUnits};
pub use config::{CubeWriterConfig, ZarrCompression};
pub use cube::{storage_name, CubeSnapshot, DataCube, PointSeriesRequest, VariableRenameMap};
pub use resolver::QueryResolver;
pub use table::{Column, Table};
pub use writer::{CubeWriteResult, ZarrCubeWriter};
pub use zarr::{ZarrDataCube, DIMENSIONS_ATTRIBUTE};
