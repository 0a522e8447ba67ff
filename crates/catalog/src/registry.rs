//! Catalog registry and selection.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use weather_common::{CatalogError, Query, Result};

use crate::catalog::Catalog;

/// How [`CatalogRegistry::select_catalog`] picks a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First registered catalog whose `can_source` is true.
    #[default]
    FirstMatch,
    /// First registered catalog, without asking it.
    FirstRegistered,
}

impl SelectionPolicy {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "first_match" => Ok(Self::FirstMatch),
            "first_registered" => Ok(Self::FirstRegistered),
            other => Err(CatalogError::configuration(format!(
                "unknown selection policy '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstMatch => "first_match",
            Self::FirstRegistered => "first_registered",
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered, immutable set of catalogs.
#[derive(Clone)]
pub struct CatalogRegistry {
    catalogs: Vec<Arc<dyn Catalog>>,
    policy: SelectionPolicy,
}

impl CatalogRegistry {
    /// Build a registry. Fails on an empty list or duplicate ids.
    pub fn new(catalogs: Vec<Arc<dyn Catalog>>, policy: SelectionPolicy) -> Result<Self> {
        if catalogs.is_empty() {
            return Err(CatalogError::configuration(
                "catalog registry must contain at least one catalog",
            ));
        }

        let mut seen = HashSet::new();
        for catalog in &catalogs {
            if !seen.insert(catalog.catalog_id()) {
                return Err(CatalogError::configuration(format!(
                    "duplicate catalog id '{}'",
                    catalog.catalog_id()
                )));
            }
        }

        info!(
            catalogs = ?catalogs.iter().map(|c| c.catalog_id()).collect::<Vec<_>>(),
            policy = %policy,
            "Catalog registry initialized"
        );
        Ok(Self { catalogs, policy })
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Catalog ids in registration order.
    pub fn catalog_ids(&self) -> Vec<&str> {
        self.catalogs.iter().map(|c| c.catalog_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    /// Pick the catalog that serves a query.
    #[instrument(skip(self, query), fields(policy = %self.policy))]
    pub async fn select_catalog(&self, query: &Query) -> Result<Arc<dyn Catalog>> {
        match self.policy {
            SelectionPolicy::FirstRegistered => self
                .catalogs
                .first()
                .cloned()
                .ok_or_else(|| CatalogError::not_found("no catalogs registered")),
            SelectionPolicy::FirstMatch => {
                for catalog in &self.catalogs {
                    if catalog.can_source(query).await? {
                        debug!(catalog = catalog.catalog_id(), "Selected catalog");
                        return Ok(catalog.clone());
                    }
                }
                Err(CatalogError::not_found(format!(
                    "no catalog can source {}/{}",
                    query.weather_model_group(),
                    query.weather_model_id()
                )))
            }
        }
    }

    /// Look up a catalog by id.
    pub fn get_catalog_by_id(&self, catalog_id: &str) -> Result<Arc<dyn Catalog>> {
        self.catalogs
            .iter()
            .find(|c| c.catalog_id() == catalog_id)
            .cloned()
            .ok_or_else(|| {
                CatalogError::not_found(format!("catalog with id '{}' not found", catalog_id))
            })
    }
}

impl std::fmt::Debug for CatalogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogRegistry")
            .field("catalogs", &self.catalog_ids())
            .field("policy", &self.policy)
            .finish()
    }
}
