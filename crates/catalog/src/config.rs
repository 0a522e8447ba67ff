//! Catalog registry configuration.
//!
//! Loaded from YAML with `${VAR}` and `${VAR:-default}` substitution:
//!
//! ```yaml
//! selection_policy: first_match
//! catalogs:
//!   - type: s3
//!     id: cloud-a
//!     bucket: weather-data
//!     prefix: zarr
//!     secrets_file: ${S3_SECRETS_FILE:-/etc/weather/secrets.yaml}
//!     timeout_secs: 30
//!     rename_map:
//!       temperature: t2m
//!   - type: local
//!     base_path: ./data
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use data_cube::{CubeWriterConfig, VariableRenameMap, ZarrCubeWriter};
use weather_common::{CatalogError, Result};

use crate::catalog::Catalog;
use crate::local::{default_local_rename_map, LocalCatalog, LOCAL_CATALOG_ID};
use crate::registry::{CatalogRegistry, SelectionPolicy};
use crate::s3::{S3Catalog, S3Secrets, S3Session};

/// Top-level registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub selection_policy: SelectionPolicy,

    /// Chunking and compression for uploads.
    #[serde(default)]
    pub writer: CubeWriterConfig,

    /// Catalogs in selection order.
    pub catalogs: Vec<CatalogConfig>,
}

/// One catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogConfig {
    Local {
        #[serde(default = "default_local_id")]
        id: String,
        base_path: PathBuf,
        /// Defaults to the ERA5 names (`t2m`, `u10m`, `v10m`).
        #[serde(default)]
        rename_map: Option<VariableRenameMap>,
    },
    S3 {
        id: String,
        bucket: String,
        #[serde(default)]
        prefix: String,
        secrets_file: PathBuf,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default)]
        rename_map: VariableRenameMap,
    },
}

fn default_local_id() -> String {
    LOCAL_CATALOG_ID.to_string()
}

fn default_timeout_secs() -> u64 {
    crate::s3::DEFAULT_TIMEOUT.as_secs()
}

impl CatalogConfig {
    pub fn id(&self) -> &str {
        match self {
            Self::Local { id, .. } | Self::S3 { id, .. } => id,
        }
    }

    /// Construct the catalog. S3 secrets are read here; the client itself
    /// is created on first use.
    pub fn build(&self, writer: &CubeWriterConfig) -> Result<Arc<dyn Catalog>> {
        let writer = ZarrCubeWriter::new(writer.clone());
        match self {
            Self::Local {
                id,
                base_path,
                rename_map,
            } => {
                let rename_map = rename_map.clone().unwrap_or_else(default_local_rename_map);
                Ok(Arc::new(LocalCatalog::with_options(
                    id.as_str(),
                    base_path.clone(),
                    rename_map,
                    writer,
                )))
            }
            Self::S3 {
                id,
                bucket,
                prefix,
                secrets_file,
                timeout_secs,
                rename_map,
            } => {
                let secrets = S3Secrets::from_file(secrets_file)?;
                let session =
                    S3Session::new(bucket.as_str(), secrets, Duration::from_secs(*timeout_secs))?;
                Ok(Arc::new(S3Catalog::new(
                    id.as_str(),
                    Arc::new(session),
                    prefix,
                    rename_map.clone(),
                    writer,
                )))
            }
        }
    }
}

impl Default for RegistryConfig {
    /// A single local catalog under `./data`.
    fn default() -> Self {
        Self {
            selection_policy: SelectionPolicy::default(),
            writer: CubeWriterConfig::default(),
            catalogs: vec![CatalogConfig::Local {
                id: default_local_id(),
                base_path: PathBuf::from("./data"),
                rename_map: None,
            }],
        }
    }
}

impl RegistryConfig {
    /// Parse YAML, expanding environment variables first.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::configuration(format!(
                "failed to read catalog config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Apply environment overrides.
    ///
    /// `CATALOG_SELECTION_POLICY` replaces the policy; each `CUBE_*`/`ZARR_*`
    /// variable overrides its own writer setting.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(val) = lookup("CATALOG_SELECTION_POLICY") {
            self.selection_policy = SelectionPolicy::parse(&val)?;
        }
        self.writer
            .apply_overrides(&lookup)
            .map_err(CatalogError::configuration)?;
        self.validate()?;
        Ok(self)
    }

    /// Default configuration with environment overrides.
    ///
    /// `LOCAL_CATALOG_PATH` sets the local catalog's base path.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("LOCAL_CATALOG_PATH") {
            config.catalogs = vec![CatalogConfig::Local {
                id: default_local_id(),
                base_path: PathBuf::from(path),
                rename_map: None,
            }];
        }
        config.apply_env()
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalogs.is_empty() {
            return Err(CatalogError::configuration("at least one catalog must be configured"));
        }

        let mut seen = HashSet::new();
        for catalog in &self.catalogs {
            if catalog.id().is_empty() {
                return Err(CatalogError::configuration("catalog id must not be empty"));
            }
            if !seen.insert(catalog.id()) {
                return Err(CatalogError::configuration(format!(
                    "duplicate catalog id '{}'",
                    catalog.id()
                )));
            }
            if let CatalogConfig::S3 { timeout_secs: 0, id, .. } = catalog {
                return Err(CatalogError::configuration(format!(
                    "catalog '{}': timeout_secs must be > 0",
                    id
                )));
            }
        }

        self.writer.validate().map_err(CatalogError::configuration)
    }

    /// Build every catalog and the registry.
    pub fn build_registry(&self) -> Result<CatalogRegistry> {
        let catalogs = self
            .catalogs
            .iter()
            .map(|c| c.build(&self.writer))
            .collect::<Result<Vec<_>>>()?;
        info!(count = catalogs.len(), "Built catalogs");
        CatalogRegistry::new(catalogs, self.selection_policy)
    }
}

/// Expand environment variables in YAML content.
/// Supports ${VAR} and ${VAR:-default} syntax.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(CatalogError::configuration(format!(
                            "unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve a `VAR` or `VAR:-default` expression.
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).map_err(|_| {
            CatalogError::configuration(format!("environment variable {} not set", expr))
        })
    }
}
