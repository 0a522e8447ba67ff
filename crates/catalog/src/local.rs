//! Local filesystem catalog.
//!
//! Used mainly for testing and development: it claims every query and
//! reads `<base_path>/<group>/<id>.zarr` directory stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use zarrs_filesystem::FilesystemStore;

use data_cube::{DataCube, VariableRenameMap, ZarrCubeWriter, ZarrDataCube};
use weather_common::{CatalogError, Query, Result, WeatherVariable};

use crate::catalog::Catalog;
use crate::layout::DatasetLayout;
use crate::strategy::{DataDownloader, DataUploader};

/// Identifier of the local catalog.
pub const LOCAL_CATALOG_ID: &str = "local";

/// Storage names of the ERA5-style datasets kept locally.
pub fn default_local_rename_map() -> VariableRenameMap {
    [
        (WeatherVariable::Temperature, "t2m"),
        (WeatherVariable::WindU, "u10m"),
        (WeatherVariable::WindV, "v10m"),
    ]
    .into_iter()
    .map(|(variable, name)| (variable, name.to_string()))
    .collect()
}

fn open_store(path: &Path) -> Result<Arc<FilesystemStore>> {
    FilesystemStore::new(path).map(Arc::new).map_err(|e| {
        CatalogError::data_access(format!("failed to open store {}: {}", path.display(), e))
    })
}

/// Reads Zarr directory stores from the local filesystem.
pub struct LocalDataDownloader {
    layout: DatasetLayout,
    rename_map: VariableRenameMap,
}

impl LocalDataDownloader {
    pub fn new(layout: DatasetLayout, rename_map: VariableRenameMap) -> Self {
        Self { layout, rename_map }
    }
}

#[async_trait]
impl DataDownloader for LocalDataDownloader {
    fn download_path(&self, query: &Query) -> String {
        self.layout.dataset_path(query)
    }

    #[instrument(skip(self, query), fields(path = %self.download_path(query)))]
    async fn download(&self, query: &Query) -> Result<Box<dyn DataCube>> {
        let path = self.layout.local_path(query);
        if !path.is_dir() {
            return Err(CatalogError::data_access(format!(
                "dataset {} does not exist",
                path.display()
            )));
        }

        let rename_map = Some(self.rename_map.clone()).filter(|m| !m.is_empty());
        let cube = tokio::task::spawn_blocking(move || {
            ZarrDataCube::open(open_store(&path)?, "/", rename_map)
        })
        .await
        .map_err(|e| CatalogError::data_access(format!("dataset open task failed: {}", e)))??;

        debug!("Opened local dataset");
        Ok(Box::new(cube))
    }
}

/// Writes Zarr directory stores to the local filesystem.
pub struct LocalDataUploader {
    layout: DatasetLayout,
    rename_map: VariableRenameMap,
    writer: ZarrCubeWriter,
}

impl LocalDataUploader {
    pub fn new(layout: DatasetLayout, rename_map: VariableRenameMap, writer: ZarrCubeWriter) -> Self {
        Self {
            layout,
            rename_map,
            writer,
        }
    }
}

#[async_trait]
impl DataUploader for LocalDataUploader {
    fn upload_path(&self, query: &Query) -> String {
        self.layout.dataset_path(query)
    }

    #[instrument(skip(self, data, query), fields(path = %self.upload_path(query)))]
    async fn upload(&self, data: &dyn DataCube, query: &Query) -> Result<bool> {
        let snapshot = data.snapshot()?;
        let path = self.layout.local_path(query);
        tokio::fs::create_dir_all(&path).await?;

        let writer = self.writer.clone();
        let rename_map = self.rename_map.clone();
        let result = tokio::task::spawn_blocking(move || {
            writer.write(open_store(&path)?, "/", &snapshot, Some(&rename_map))
        })
        .await
        .map_err(|e| CatalogError::data_access(format!("dataset write task failed: {}", e)))??;

        info!(
            arrays = result.arrays_written,
            bytes = result.bytes_written,
            "Uploaded dataset"
        );
        Ok(true)
    }
}

/// Catalog over a local directory tree.
pub struct LocalCatalog {
    id: String,
    base_path: PathBuf,
    downloader: LocalDataDownloader,
    uploader: LocalDataUploader,
}

impl LocalCatalog {
    /// Local catalog with id `"local"` and the default rename map.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_options(
            LOCAL_CATALOG_ID,
            base_path,
            default_local_rename_map(),
            ZarrCubeWriter::default(),
        )
    }

    pub fn with_options(
        id: impl Into<String>,
        base_path: impl Into<PathBuf>,
        rename_map: VariableRenameMap,
        writer: ZarrCubeWriter,
    ) -> Self {
        let base_path = base_path.into();
        let layout = DatasetLayout::new(base_path.to_string_lossy());
        Self {
            id: id.into(),
            base_path,
            downloader: LocalDataDownloader::new(layout.clone(), rename_map.clone()),
            uploader: LocalDataUploader::new(layout, rename_map, writer),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl Catalog for LocalCatalog {
    fn catalog_id(&self) -> &str {
        &self.id
    }

    async fn can_source(&self, _query: &Query) -> Result<bool> {
        Ok(true)
    }

    fn downloader(&self) -> &dyn DataDownloader {
        &self.downloader
    }

    fn uploader(&self) -> &dyn DataUploader {
        &self.uploader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn query() -> Query {
        Query::builder()
            .point(37.0, -122.0)
            .between(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
            .model("era5", "reanalysis")
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_rename_map() {
        let map = default_local_rename_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&WeatherVariable::Temperature], "t2m");
        assert_eq!(map[&WeatherVariable::WindU], "u10m");
        assert_eq!(map[&WeatherVariable::WindV], "v10m");
    }

    #[test]
    fn test_upload_and_download_paths_match() {
        let catalog = LocalCatalog::new("/data/weather");
        assert_eq!(catalog.catalog_id(), "local");
        assert_eq!(
            catalog.uploader().upload_path(&query()),
            catalog.downloader().download_path(&query())
        );
        assert_eq!(
            catalog.downloader().download_path(&query()),
            "/data/weather/era5/reanalysis.zarr"
        );
    }

    #[tokio::test]
    async fn test_can_source_always_true() {
        let catalog = LocalCatalog::new("/nonexistent");
        assert!(catalog.can_source(&query()).await.unwrap());
    }

    #[tokio::test]
    async fn test_download_missing_dataset() {
        let dir = tempfile::TempDir::new().unwrap();
        let catalog = LocalCatalog::new(dir.path());
        let err = catalog.get_data(&query()).await.err().unwrap();
        assert!(matches!(err, CatalogError::DataAccess(_)));
    }

    #[tokio::test]
    async fn test_upload_writes_off_the_async_task() {
        let source = test_utils::SampleDataset::era5().unwrap();
        let cube = LocalCatalog::new(source.base_path())
            .get_data(&query())
            .await
            .unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let target = LocalCatalog::new(dir.path());
        assert!(target.upload_data(cube.as_ref(), &query()).await.unwrap());

        let dataset = dir.path().join("era5/reanalysis.zarr");
        assert!(dataset.join("zarr.json").exists());
        assert!(dataset.join("t2m/zarr.json").exists());
        assert!(dataset.join("time/zarr.json").exists());
    }
}
