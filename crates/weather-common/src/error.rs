//! Error types for the weather catalog crates.

use thiserror::Error;

/// Result type alias using CatalogError.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors surfaced by query construction, catalog selection and data access.
///
/// Nothing in the library recovers from these; every failure is returned to
/// the caller, which owns user-facing reporting.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed or missing query fields, or an invalid parameter schema.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing credentials or an inconsistent catalog registry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unknown catalog id, or no catalog can source a query.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage read/write failure.
    #[error("data access error: {0}")]
    DataAccess(String),

    /// Unrecognized query shape or a variable missing from a rename map.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
}

impl CatalogError {
    /// Create a Validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a DataAccess error.
    pub fn data_access(msg: impl Into<String>) -> Self {
        Self::DataAccess(msg.into())
    }

    /// Create an UnsupportedQuery error.
    pub fn unsupported_query(msg: impl Into<String>) -> Self {
        Self::UnsupportedQuery(msg.into())
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "validation",
            CatalogError::Configuration(_) => "configuration",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::DataAccess(_) => "data_access",
            CatalogError::UnsupportedQuery(_) => "unsupported_query",
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::DataAccess(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Validation(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for CatalogError {
    fn from(err: serde_yaml::Error) -> Self {
        CatalogError::Configuration(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_data_access() {
        let err: CatalogError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing.zarr").into();
        assert!(matches!(err, CatalogError::DataAccess(_)));
        assert_eq!(err.kind(), "data_access");
    }

    #[test]
    fn test_display_includes_message() {
        let err = CatalogError::not_found("catalog 'cloud-b'");
        assert_eq!(err.to_string(), "not found: catalog 'cloud-b'");
    }
}
