//! Downloader and uploader strategies.

use async_trait::async_trait;

use data_cube::DataCube;
use weather_common::{Query, Result};

/// Reads the dataset a query addresses.
#[async_trait]
pub trait DataDownloader: Send + Sync {
    /// Storage path the query resolves to.
    fn download_path(&self, query: &Query) -> String;

    /// Open the dataset as a data cube.
    async fn download(&self, query: &Query) -> Result<Box<dyn DataCube>>;
}

/// Writes a data cube to the location a query addresses.
#[async_trait]
pub trait DataUploader: Send + Sync {
    /// Storage path the query resolves to.
    fn upload_path(&self, query: &Query) -> String;

    /// Write the cube. Returns `true` once metadata and data are stored.
    async fn upload(&self, data: &dyn DataCube, query: &Query) -> Result<bool>;
}
