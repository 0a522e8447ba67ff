//! Common types shared across the weather catalog crates.
//!
//! - [`Query`]: the validated description of a data request
//! - [`params`]: flat dotted-key parameter transforms used by the orchestrator
//! - [`schema`]: parameter schema export for the orchestrator's input form
//! - [`CatalogError`]: the error taxonomy every crate returns

pub mod error;
pub mod params;
pub mod query;
pub mod schema;
pub mod variable;

pub use error::{CatalogError, Result};
pub use params::{flatten, unflatten, FlatParams, Record};
pub use query::{parse_timestamp, Location, PointLocation, Query, QueryBuilder, RegionLocation};
pub use schema::{schema_to_json, ParamSchema, ParamSpec, ParamType, SchemaField, SchemaNode};
pub use variable::{Coordinate, Frequency, Resolution, WeatherVariable};
