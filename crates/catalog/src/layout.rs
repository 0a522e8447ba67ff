//! Dataset path layout shared by downloaders and uploaders.

use std::path::PathBuf;

use weather_common::Query;

/// Suffix of dataset directories and prefixes.
pub const DATASET_SUFFIX: &str = ".zarr";

/// Maps a query to `<root>/<weather_model_group>/<weather_model_id>.zarr`.
///
/// A catalog builds its downloader and uploader from one layout, so both
/// always address the same dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: String,
}

impl DatasetLayout {
    /// Create a layout under `root`. Trailing slashes are ignored; an empty
    /// root yields relative paths.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let trimmed = root.trim_end_matches('/');
        // Keep a bare "/" as the filesystem root.
        let root = if trimmed.is_empty() && root.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// `<group>/<id>.zarr`
    pub fn relative_path(query: &Query) -> String {
        format!(
            "{}/{}{}",
            query.weather_model_group(),
            query.weather_model_id(),
            DATASET_SUFFIX
        )
    }

    /// Full dataset path for a query.
    pub fn dataset_path(&self, query: &Query) -> String {
        let relative = Self::relative_path(query);
        match self.root.as_str() {
            "" => relative,
            "/" => format!("/{}", relative),
            root => format!("{}/{}", root, relative),
        }
    }

    /// Dataset path as a filesystem path.
    pub fn local_path(&self, query: &Query) -> PathBuf {
        PathBuf::from(self.dataset_path(query))
    }
}
