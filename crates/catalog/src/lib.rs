//! Weather data catalogs.
//!
//! A [`Catalog`] is a named storage backend that can tell whether it holds
//! the dataset a [`weather_common::Query`] addresses, open it as a
//! [`data_cube::DataCube`], and write a cube back. Reads and writes go
//! through [`DataDownloader`] and [`DataUploader`] strategies that share a
//! [`DatasetLayout`].
//!
//! Backends:
//! - [`LocalCatalog`]: Zarr directory stores under a base path
//! - [`S3Catalog`]: Zarr stores under a bucket prefix
//!
//! [`CatalogRegistry`] holds the configured catalogs in order and selects
//! one per query.

pub mod catalog;
pub mod config;
pub mod layout;
pub mod local;
pub mod registry;
pub mod s3;
pub mod strategy;

pub use catalog::Catalog;
pub use config::{CatalogConfig, RegistryConfig};
pub use layout::DatasetLayout;
pub use local::{default_local_rename_map, LocalCatalog, LocalDataDownloader, LocalDataUploader, LOCAL_CATALOG_ID};
pub use registry::{CatalogRegistry, SelectionPolicy};
pub use s3::{S3Catalog, S3DataDownloader, S3DataUploader, S3Secrets, S3Session};
pub use strategy::{DataDownloader, DataUploader};
pub use weather_common::{CatalogError, Result};
