//! Query model.
//!
//! A [`Query`] describes one data request: where, when, which variable and
//! which weather model. It is built either from the orchestrator's flat
//! parameters ([`Query::from_params`]) or with the fluent [`QueryBuilder`],
//! and is validated on construction.
//!
//! # Examples
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use weather_common::{Query, WeatherVariable};
//!
//! let query = Query::builder()
//!     .point(37.0, -122.0)
//!     .between(
//!         Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//!         Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
//!     )
//!     .model("era5", "reanalysis")
//!     .variable(WeatherVariable::Temperature)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(query.weather_model_group(), "era5");
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, Result};
use crate::params::{flatten, unflatten, FlatParams, Record};
use crate::schema::{ParamSchema, ParamSpec, ParamType, SchemaField};
use crate::variable::{Frequency, Resolution, WeatherVariable};

/// A single geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// A latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionLocation {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

/// Where a query applies.
///
/// Serialized without a tag: the field names tell the shapes apart, which
/// keeps the flat form keys as `location.latitude` / `location.longitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Point(PointLocation),
    Region(RegionLocation),
}

impl Location {
    /// Short shape name for logs and errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Location::Point(_) => "point",
            Location::Region(_) => "region",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Location::Point(point) => {
                check_latitude("location.latitude", point.latitude)?;
                check_longitude("location.longitude", point.longitude)
            }
            Location::Region(region) => {
                check_latitude("location.min_latitude", region.min_latitude)?;
                check_latitude("location.max_latitude", region.max_latitude)?;
                check_longitude("location.min_longitude", region.min_longitude)?;
                check_longitude("location.max_longitude", region.max_longitude)?;
                if region.min_latitude > region.max_latitude
                    || region.min_longitude > region.max_longitude
                {
                    return Err(CatalogError::validation(
                        "region minimum bounds must not exceed maximum bounds",
                    ));
                }
                Ok(())
            }
        }
    }
}

fn check_latitude(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
        return Err(CatalogError::validation(format!(
            "{} must be within [-90, 90], got {}",
            field, value
        )));
    }
    Ok(())
}

fn check_longitude(field: &str, value: f64) -> Result<()> {
    // Both -180..180 and 0..360 grids are common.
    if !value.is_finite() || !(-180.0..=360.0).contains(&value) {
        return Err(CatalogError::validation(format!(
            "{} must be within [-180, 360], got {}",
            field, value
        )));
    }
    Ok(())
}

fn check_path_segment(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::validation(format!("{} must not be empty", field)));
    }
    if value.contains('/') || value.contains('\\') || value.contains("..") {
        return Err(CatalogError::validation(format!(
            "{} '{}' must not contain path separators or '..'",
            field, value
        )));
    }
    Ok(())
}

/// Parse a timestamp as RFC 3339, a naive date-time (assumed UTC) or a date.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(CatalogError::validation(format!("invalid timestamp '{}'", s)))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// A validated data request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Query {
    #[serde(deserialize_with = "deserialize_timestamp")]
    start_date: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    end_date: DateTime<Utc>,
    frequency: Frequency,
    location: Location,
    weather_model_group: String,
    weather_model_id: String,
    resolution: Resolution,
    variable: WeatherVariable,
}

impl Query {
    /// Start building a query.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Build a query from a nested record.
    pub fn from_record(record: Record) -> Result<Self> {
        let query: Query = serde_json::from_value(Value::Object(record))
            .map_err(|e| CatalogError::validation(format!("invalid query: {}", e)))?;
        query.validate()?;
        Ok(query)
    }

    /// Build a query from the orchestrator's flat parameters.
    pub fn from_params(params: &FlatParams) -> Result<Self> {
        Self::from_record(unflatten(params)?)
    }

    /// Nested record form of this query.
    pub fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(CatalogError::validation(format!(
                "query serialized to a non-object: {}",
                other
            ))),
        }
    }

    /// Flat parameter form of this query.
    pub fn to_params(&self) -> Result<FlatParams> {
        flatten(&self.to_record()?)
    }

    fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(CatalogError::validation(format!(
                "end_date {} is before start_date {}",
                self.end_date.to_rfc3339(),
                self.start_date.to_rfc3339()
            )));
        }
        self.location.validate()?;
        check_path_segment("weather_model_group", &self.weather_model_group)?;
        check_path_segment("weather_model_id", &self.weather_model_id)
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn weather_model_group(&self) -> &str {
        &self.weather_model_group
    }

    pub fn weather_model_id(&self) -> &str {
        &self.weather_model_id
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn variable(&self) -> WeatherVariable {
        self.variable
    }
}

impl ParamSchema for Query {
    fn schema() -> Vec<SchemaField> {
        vec![
            SchemaField::leaf(
                "start_date",
                ParamSpec::new(ParamType::DateTime).with_description("Start of the time range (UTC)"),
            ),
            SchemaField::leaf(
                "end_date",
                ParamSpec::new(ParamType::DateTime).with_description("End of the time range (UTC), inclusive"),
            ),
            SchemaField::leaf(
                "frequency",
                ParamSpec::new(ParamType::enumeration(Frequency::ALL))
                    .with_default(Frequency::Hourly.as_str()),
            ),
            SchemaField::nested(
                "location",
                vec![
                    SchemaField::leaf(
                        "latitude",
                        ParamSpec::new(ParamType::Number).with_description("Latitude in degrees"),
                    ),
                    SchemaField::leaf(
                        "longitude",
                        ParamSpec::new(ParamType::Number).with_description("Longitude in degrees"),
                    ),
                ],
            ),
            SchemaField::leaf(
                "weather_model_group",
                ParamSpec::new(ParamType::String).with_description("Logical dataset, e.g. a model family"),
            ),
            SchemaField::leaf(
                "weather_model_id",
                ParamSpec::new(ParamType::String).with_description("Dataset instance within the group"),
            ),
            SchemaField::leaf(
                "resolution",
                ParamSpec::new(ParamType::enumeration(Resolution::ALL))
                    .with_default(Resolution::Km25.as_str()),
            ),
            SchemaField::leaf(
                "variable",
                ParamSpec::new(ParamType::enumeration(WeatherVariable::ALL))
                    .with_default(WeatherVariable::Temperature.as_str()),
            ),
        ]
    }
}

/// Fluent constructor for [`Query`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    location: Option<Location>,
    weather_model_group: Option<String>,
    weather_model_id: Option<String>,
    variable: WeatherVariable,
    frequency: Frequency,
    resolution: Resolution,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            location: None,
            weather_model_group: None,
            weather_model_id: None,
            variable: WeatherVariable::Temperature,
            frequency: Frequency::Hourly,
            resolution: Resolution::Km25,
        }
    }
}

impl QueryBuilder {
    pub fn point(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(Location::Point(PointLocation {
            latitude,
            longitude,
        }));
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn model(mut self, group: impl Into<String>, id: impl Into<String>) -> Self {
        self.weather_model_group = Some(group.into());
        self.weather_model_id = Some(id.into());
        self
    }

    pub fn variable(mut self, variable: WeatherVariable) -> Self {
        self.variable = variable;
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Validate and build the query.
    pub fn build(self) -> Result<Query> {
        fn required<T>(value: Option<T>, field: &str) -> Result<T> {
            value.ok_or_else(|| CatalogError::validation(format!("missing field '{}'", field)))
        }

        let query = Query {
            start_date: required(self.start_date, "start_date")?,
            end_date: required(self.end_date, "end_date")?,
            frequency: self.frequency,
            location: required(self.location, "location")?,
            weather_model_group: required(self.weather_model_group, "weather_model_group")?,
            weather_model_id: required(self.weather_model_id, "weather_model_id")?,
            resolution: self.resolution,
            variable: self.variable,
        };
        query.validate()?;
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn flat(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn sample_params() -> Map<String, Value> {
        flat(json!({
            "start_date": "2024-01-01T00:00:00Z",
            "end_date": "2024-01-03T00:00:00Z",
            "frequency": "hourly",
            "location.latitude": 37.0,
            "location.longitude": -122.0,
            "weather_model_group": "era5",
            "weather_model_id": "reanalysis",
            "resolution": "25km",
            "variable": "temperature",
        }))
    }

    #[test]
    fn test_from_params() {
        let query = Query::from_params(&sample_params()).unwrap();
        assert_eq!(
            query.location(),
            &Location::Point(PointLocation {
                latitude: 37.0,
                longitude: -122.0
            })
        );
        assert_eq!(query.variable(), WeatherVariable::Temperature);
        assert_eq!(query.resolution(), Resolution::Km25);
        assert_eq!(query.weather_model_id(), "reanalysis");
    }

    #[test]
    fn test_params_round_trip() {
        let query = Query::from_params(&sample_params()).unwrap();
        let params = query.to_params().unwrap();
        assert_eq!(params.get("location.latitude"), Some(&json!(37.0)));
        assert_eq!(Query::from_params(&params).unwrap(), query);
    }

    #[test]
    fn test_naive_and_date_only_timestamps() {
        let mut params = sample_params();
        params.insert("start_date".into(), json!("2024-01-01"));
        params.insert("end_date".into(), json!("2024-01-02T06:00:00"));
        let query = Query::from_params(&params).unwrap();
        assert_eq!(
            query.start_date(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            query.end_date(),
            Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_field_is_validation_error() {
        let mut params = sample_params();
        params.remove("weather_model_id");
        assert!(matches!(
            Query::from_params(&params),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_enum_value_is_validation_error() {
        let mut params = sample_params();
        params.insert("variable".into(), json!("snowfall"));
        assert!(matches!(
            Query::from_params(&params),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut params = sample_params();
        params.insert("end_date".into(), json!("2023-12-31T00:00:00Z"));
        let err = Query::from_params(&params).unwrap_err();
        assert!(err.to_string().contains("before start_date"));
    }

    #[test]
    fn test_latitude_out_of_range_rejected() {
        let mut params = sample_params();
        params.insert("location.latitude".into(), json!(91.5));
        assert!(matches!(
            Query::from_params(&params),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let mut params = sample_params();
        params.insert("weather_model_group".into(), json!("../etc"));
        assert!(Query::from_params(&params).is_err());
    }

    #[test]
    fn test_region_location_parses() {
        let mut params = sample_params();
        params.remove("location.latitude");
        params.remove("location.longitude");
        params.insert("location.min_latitude".into(), json!(30.0));
        params.insert("location.max_latitude".into(), json!(40.0));
        params.insert("location.min_longitude".into(), json!(-125.0));
        params.insert("location.max_longitude".into(), json!(-115.0));

        let query = Query::from_params(&params).unwrap();
        assert_eq!(query.location().shape(), "region");
    }

    #[test]
    fn test_builder_requires_location() {
        let err = Query::builder()
            .between(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
            .model("era5", "reanalysis")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("location"));
    }

    #[test]
    fn test_param_schema_keys_match_params() {
        let schema = Query::param_schema().unwrap();
        let mut schema_keys: Vec<_> = schema.keys().cloned().collect();
        let mut param_keys: Vec<_> = sample_params().keys().cloned().collect();
        schema_keys.sort();
        param_keys.sort();
        assert_eq!(schema_keys, param_keys);

        assert_eq!(
            schema["variable"].param_type,
            ParamType::Enum(vec![
                "temperature".into(),
                "pressure".into(),
                "humidity".into(),
                "wind_u".into(),
                "wind_v".into(),
            ])
        );
        assert_eq!(schema["start_date"].param_type, ParamType::DateTime);
    }
}
