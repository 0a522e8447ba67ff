//! Parameter schema export for the orchestrator's input form.
//!
//! Types describe their fields once through [`ParamSchema`]; nested
//! records are flattened with the same dotted-key rule as
//! [`crate::params::flatten`], so the form keys line up with what
//! `Query::from_params` expects back.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::error::{CatalogError, Result};
use crate::params::{check_flat_keys, KEY_SEPARATOR};

/// Primitive type of a form parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// RFC 3339 timestamp.
    DateTime,
    /// One of a closed set of string values.
    Enum(Vec<String>),
}

impl ParamType {
    /// Build an enum parameter type from a closed enumeration.
    pub fn enumeration<T: ToString>(values: impl IntoIterator<Item = T>) -> Self {
        Self::Enum(values.into_iter().map(|v| v.to_string()).collect())
    }

    /// JSON-schema keywords describing this type.
    pub fn to_json(&self) -> Map<String, Value> {
        let value = match self {
            Self::String => json!({"type": "string"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Date => json!({"type": "string", "format": "date"}),
            Self::DateTime => json!({"type": "string", "format": "date-time"}),
            Self::Enum(values) => json!({"type": "string", "enum": values}),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// A single form parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn new(param_type: ParamType) -> Self {
        Self {
            param_type,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Render as the JSON object handed to the orchestrator.
    pub fn to_json(&self) -> Value {
        let mut map = self.param_type.to_json();
        map.insert(
            "default".to_string(),
            self.default.clone().unwrap_or(Value::Null),
        );
        if let Some(description) = &self.description {
            map.insert("description".to_string(), json!(description));
        }
        Value::Object(map)
    }
}

/// A field in a (possibly nested) schema.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Leaf(ParamSpec),
    Nested(Vec<SchemaField>),
}

#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: &'static str,
    pub node: SchemaNode,
}

impl SchemaField {
    pub fn leaf(name: &'static str, spec: ParamSpec) -> Self {
        Self {
            name,
            node: SchemaNode::Leaf(spec),
        }
    }

    pub fn nested(name: &'static str, fields: Vec<SchemaField>) -> Self {
        Self {
            name,
            node: SchemaNode::Nested(fields),
        }
    }
}

/// Types that can describe themselves as form parameters.
pub trait ParamSchema {
    /// Nested field description.
    fn schema() -> Vec<SchemaField>;

    /// Flattened schema keyed by dotted parameter name.
    fn param_schema() -> Result<BTreeMap<String, ParamSpec>> {
        flatten_schema(&Self::schema())
    }
}

/// Flatten a nested schema into dotted keys.
///
/// Duplicate keys, and a leaf that shares its name with a nested schema,
/// are rejected.
pub fn flatten_schema(fields: &[SchemaField]) -> Result<BTreeMap<String, ParamSpec>> {
    let mut flat = BTreeMap::new();
    flatten_schema_into(&mut flat, None, fields)?;
    check_flat_keys(flat.keys(), |key| flat.contains_key(key))?;
    Ok(flat)
}

fn flatten_schema_into(
    flat: &mut BTreeMap<String, ParamSpec>,
    prefix: Option<&str>,
    fields: &[SchemaField],
) -> Result<()> {
    for field in fields {
        if field.name.is_empty() || field.name.contains(KEY_SEPARATOR) {
            return Err(CatalogError::validation(format!(
                "schema field name '{}' must be non-empty and contain no '{}'",
                field.name, KEY_SEPARATOR
            )));
        }

        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, KEY_SEPARATOR, field.name),
            None => field.name.to_string(),
        };

        match &field.node {
            SchemaNode::Leaf(spec) => {
                if flat.insert(path.clone(), spec.clone()).is_some() {
                    return Err(CatalogError::validation(format!(
                        "duplicate schema parameter '{}'",
                        path
                    )));
                }
            }
            SchemaNode::Nested(inner) if inner.is_empty() => {
                return Err(CatalogError::validation(format!(
                    "nested schema '{}' has no fields",
                    path
                )));
            }
            SchemaNode::Nested(inner) => flatten_schema_into(flat, Some(&path), inner)?,
        }
    }
    Ok(())
}

/// Render a flattened schema as a JSON object.
pub fn schema_to_json(schema: &BTreeMap<String, ParamSpec>) -> Value {
    Value::Object(
        schema
            .iter()
            .map(|(key, spec)| (key.clone(), spec.to_json()))
            .collect(),
    )
}
