//! Pipeline steps driven by the CLI.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use catalog::{Catalog, CatalogRegistry};
use data_cube::{QueryResolver, Table};
use weather_common::{schema_to_json, FlatParams, ParamSchema, Query};

/// Output format for resolved tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

/// The flattened query parameter schema as pretty JSON.
pub fn schema_json() -> Result<String> {
    let schema = Query::param_schema()?;
    Ok(serde_json::to_string_pretty(&schema_to_json(&schema))?)
}

/// Read a JSON object of flat parameters.
pub fn load_params(path: &Path) -> Result<FlatParams> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameters from {:?}", path))?;
    parse_params(&content)
}

pub fn parse_params(content: &str) -> Result<FlatParams> {
    match serde_json::from_str::<Value>(content).context("Failed to parse parameters JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Parameters must be a JSON object, got {}", other),
    }
}

/// Pick the catalog: by id when given, otherwise by the registry's policy.
pub async fn choose_catalog(
    registry: &CatalogRegistry,
    query: &Query,
    catalog_id: Option<&str>,
) -> Result<std::sync::Arc<dyn Catalog>> {
    let catalog = match catalog_id {
        Some(id) => registry.get_catalog_by_id(id)?,
        None => registry.select_catalog(query).await?,
    };
    info!(catalog = catalog.catalog_id(), "Using catalog");
    Ok(catalog)
}

/// Build the query, select a catalog and resolve the table.
pub async fn run_query(
    registry: &CatalogRegistry,
    params: &FlatParams,
    catalog_id: Option<&str>,
) -> Result<Table> {
    let query = Query::from_params(params)?;
    info!(
        group = query.weather_model_group(),
        id = query.weather_model_id(),
        variable = %query.variable(),
        "Built query"
    );

    let catalog = choose_catalog(registry, &query, catalog_id).await?;
    let cube = catalog.get_data(&query).await?;
    let table = QueryResolver::new().resolve(&query, cube.as_ref())?;
    info!(rows = table.num_rows(), "Resolved query");
    Ok(table)
}

/// Copy the dataset a query addresses from one catalog to another.
pub async fn copy_dataset(
    registry: &CatalogRegistry,
    params: &FlatParams,
    from: &str,
    to: &str,
) -> Result<bool> {
    let query = Query::from_params(params)?;
    let source = registry.get_catalog_by_id(from)?;
    let target = registry.get_catalog_by_id(to)?;

    let cube = source.get_data(&query).await?;
    let uploaded = target.upload_data(cube.as_ref(), &query).await?;
    info!(from, to, path = %target.uploader().upload_path(&query), "Copied dataset");
    Ok(uploaded)
}

pub fn render(table: &Table, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Csv => Ok(table.to_csv()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(table)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use catalog::{LocalCatalog, SelectionPolicy};
    use test_utils::{sample_params, SampleDataset};
    use weather_common::CatalogError;

    fn registry(dataset: &SampleDataset) -> CatalogRegistry {
        let local: Arc<dyn Catalog> = Arc::new(LocalCatalog::new(dataset.base_path()));
        CatalogRegistry::new(vec![local], SelectionPolicy::FirstMatch).unwrap()
    }

    #[test]
    fn test_schema_json_lists_flat_keys() {
        let schema: Value = serde_json::from_str(&schema_json().unwrap()).unwrap();
        assert!(schema.get("location.latitude").is_some());
        assert!(schema.get("start_date").is_some());
    }

    #[test]
    fn test_parse_params_rejects_non_object() {
        assert!(parse_params("[1, 2]").is_err());
        assert!(parse_params("{\"variable\": \"temperature\"}").is_ok());
    }

    #[tokio::test]
    async fn test_run_query_end_to_end() {
        let dataset = SampleDataset::era5().unwrap();
        let table = run_query(&registry(&dataset), &sample_params(), None)
            .await
            .unwrap();
        assert_eq!(table.num_rows(), 6);

        let csv = render(&table, OutputFormat::Csv).unwrap();
        assert!(csv.starts_with("time,temperature\n2024-01-01T00:00:00Z,"));
    }

    #[tokio::test]
    async fn test_run_query_unknown_catalog() {
        let dataset = SampleDataset::era5().unwrap();
        let err = run_query(&registry(&dataset), &sample_params(), Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::NotFound(_))
        ));
    }
}
