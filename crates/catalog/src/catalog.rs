//! The catalog abstraction.

use async_trait::async_trait;

use data_cube::DataCube;
use weather_common::{Query, Result};

use crate::strategy::{DataDownloader, DataUploader};

/// A named storage backend for weather datasets.
///
/// Implementations provide a downloader and an uploader; reads and writes
/// go through them unless a variant overrides [`Catalog::get_data`] or
/// [`Catalog::upload_data`].
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Identifier, unique within a registry.
    fn catalog_id(&self) -> &str;

    /// Whether this catalog can serve the query.
    async fn can_source(&self, query: &Query) -> Result<bool>;

    fn downloader(&self) -> &dyn DataDownloader;

    fn uploader(&self) -> &dyn DataUploader;

    /// Open the dataset the query addresses.
    async fn get_data(&self, query: &Query) -> Result<Box<dyn DataCube>> {
        self.downloader().download(query).await
    }

    /// Write a cube to the location the query addresses.
    async fn upload_data(&self, data: &dyn DataCube, query: &Query) -> Result<bool> {
        self.uploader().upload(data, query).await
    }
}
