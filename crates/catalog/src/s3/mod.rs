//! S3 object store catalog.
//!
//! Datasets live at `s3://<bucket>/<prefix>/<group>/<id>.zarr`. Zarr reads
//! and writes go through the session's client wrapped in an async-to-sync
//! adapter, so they must run on a multi-threaded tokio runtime.

pub mod session;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use data_cube::{DataCube, VariableRenameMap, ZarrCubeWriter, ZarrDataCube};
use weather_common::{Query, Result};

use crate::catalog::Catalog;
use crate::layout::DatasetLayout;
use crate::strategy::{DataDownloader, DataUploader};

pub use session::{S3Secrets, S3Session, S3ZarrStorage, TokioBlockOn, DEFAULT_REGION, DEFAULT_TIMEOUT};

/// Metadata objects marking a Zarr group (v3, then v2).
const GROUP_METADATA_KEYS: [&str; 2] = ["zarr.json", ".zgroup"];

fn rename_or_none(rename_map: &VariableRenameMap) -> Option<VariableRenameMap> {
    Some(rename_map.clone()).filter(|m| !m.is_empty())
}

/// Reads Zarr datasets from S3.
pub struct S3DataDownloader {
    session: Arc<S3Session>,
    layout: DatasetLayout,
    rename_map: VariableRenameMap,
}

impl S3DataDownloader {
    pub fn new(session: Arc<S3Session>, layout: DatasetLayout, rename_map: VariableRenameMap) -> Self {
        Self {
            session,
            layout,
            rename_map,
        }
    }
}

#[async_trait]
impl DataDownloader for S3DataDownloader {
    fn download_path(&self, query: &Query) -> String {
        self.layout.dataset_path(query)
    }

    #[instrument(skip(self, query), fields(bucket = %self.session.bucket(), path = %self.download_path(query)))]
    async fn download(&self, query: &Query) -> Result<Box<dyn DataCube>> {
        let storage = self.session.zarr_storage().await?;
        let path = self.download_path(query);
        let cube = ZarrDataCube::open(storage, &path, rename_or_none(&self.rename_map))?;
        debug!("Opened S3 dataset");
        Ok(Box::new(cube))
    }
}

/// Writes Zarr datasets to S3.
pub struct S3DataUploader {
    session: Arc<S3Session>,
    layout: DatasetLayout,
    rename_map: VariableRenameMap,
    writer: ZarrCubeWriter,
}

impl S3DataUploader {
    pub fn new(
        session: Arc<S3Session>,
        layout: DatasetLayout,
        rename_map: VariableRenameMap,
        writer: ZarrCubeWriter,
    ) -> Self {
        Self {
            session,
            layout,
            rename_map,
            writer,
        }
    }
}

#[async_trait]
impl DataUploader for S3DataUploader {
    fn upload_path(&self, query: &Query) -> String {
        self.layout.dataset_path(query)
    }

    #[instrument(skip(self, data, query), fields(bucket = %self.session.bucket(), path = %self.upload_path(query)))]
    async fn upload(&self, data: &dyn DataCube, query: &Query) -> Result<bool> {
        let snapshot = data.snapshot()?;
        let storage = self.session.zarr_storage().await?;
        let result = self.writer.write(
            storage,
            &self.upload_path(query),
            &snapshot,
            Some(&self.rename_map),
        )?;

        info!(
            arrays = result.arrays_written,
            bytes = result.bytes_written,
            "Uploaded dataset"
        );
        Ok(true)
    }
}

/// Catalog over a bucket prefix.
pub struct S3Catalog {
    id: String,
    session: Arc<S3Session>,
    downloader: S3DataDownloader,
    uploader: S3DataUploader,
}

impl S3Catalog {
    pub fn new(
        id: impl Into<String>,
        session: Arc<S3Session>,
        prefix: &str,
        rename_map: VariableRenameMap,
        writer: ZarrCubeWriter,
    ) -> Self {
        // Object keys never start with a slash.
        let layout = DatasetLayout::new(prefix.trim_start_matches('/'));
        Self {
            id: id.into(),
            downloader: S3DataDownloader::new(session.clone(), layout.clone(), rename_map.clone()),
            uploader: S3DataUploader::new(session.clone(), layout, rename_map, writer),
            session,
        }
    }

    pub fn session(&self) -> &S3Session {
        &self.session
    }
}

#[async_trait]
impl Catalog for S3Catalog {
    fn catalog_id(&self) -> &str {
        &self.id
    }

    /// True iff a Zarr group exists at the dataset path.
    #[instrument(skip(self, query), fields(catalog = %self.id))]
    async fn can_source(&self, query: &Query) -> Result<bool> {
        let path = self.downloader.download_path(query);
        for key in GROUP_METADATA_KEYS {
            if self.session.exists(&format!("{}/{}", path, key)).await? {
                return Ok(true);
            }
        }
        debug!(path = %path, "Dataset not present");
        Ok(false)
    }

    fn downloader(&self) -> &dyn DataDownloader {
        &self.downloader
    }

    fn uploader(&self) -> &dyn DataUploader {
        &self.uploader
    }
}
