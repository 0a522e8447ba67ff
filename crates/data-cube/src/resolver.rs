//! Query resolution against a data cube.

use tracing::{debug, instrument};

use weather_common::{CatalogError, Location, PointLocation, Query, Result};

use crate::cube::{DataCube, PointSeriesRequest};
use crate::table::Table;

/// Turns a [`Query`] into a read against a [`DataCube`].
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryResolver;

impl QueryResolver {
    pub fn new() -> Self {
        Self
    }

    /// Extract the table a query asks for.
    ///
    /// Point locations yield the time series at the nearest grid point.
    /// Region locations are not supported.
    #[instrument(skip(self, query, cube), fields(
        group = %query.weather_model_group(),
        id = %query.weather_model_id(),
        location = query.location().shape()
    ))]
    pub fn resolve(&self, query: &Query, cube: &dyn DataCube) -> Result<Table> {
        match query.location() {
            Location::Point(point) => self.resolve_point(query, point, cube),
            Location::Region(_) => Err(CatalogError::unsupported_query(
                "region locations are not supported, use a point location",
            )),
        }
    }

    fn resolve_point(
        &self,
        query: &Query,
        point: &PointLocation,
        cube: &dyn DataCube,
    ) -> Result<Table> {
        let request = PointSeriesRequest {
            latitude: point.latitude,
            longitude: point.longitude,
            start_date: query.start_date(),
            end_date: query.end_date(),
            variables: vec![query.variable()],
        };

        let table = cube.get_data(&request)?;
        debug!(rows = table.num_rows(), columns = table.num_columns(), "Resolved point query");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use weather_common::{RegionLocation, WeatherVariable};

    use crate::cube::{CubeSnapshot, VariableRenameMap};

    /// Cube that records the request it receives.
    #[derive(Default)]
    struct RecordingCube {
        seen: Mutex<Option<PointSeriesRequest>>,
    }

    impl DataCube for RecordingCube {
        fn get_data(&self, request: &PointSeriesRequest) -> Result<Table> {
            *self.seen.lock().unwrap() = Some(request.clone());
            let mut table = Table::new(vec![request.start_date]);
            for variable in &request.variables {
                table.push_column(variable.as_str(), vec![1.0])?;
            }
            Ok(table)
        }

        fn snapshot(&self) -> Result<CubeSnapshot> {
            Err(CatalogError::data_access("not available"))
        }

        fn rename_map(&self) -> Option<&VariableRenameMap> {
            None
        }
    }

    fn query(location: Location) -> Query {
        Query::builder()
            .location(location)
            .between(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
            .model("era5", "reanalysis")
            .variable(WeatherVariable::WindV)
            .build()
            .unwrap()
    }

    #[test]
    fn test_point_query_builds_request() {
        let cube = RecordingCube::default();
        let q = query(Location::Point(PointLocation {
            latitude: 37.0,
            longitude: -122.0,
        }));

        let table = QueryResolver::new().resolve(&q, &cube).unwrap();
        assert_eq!(table.column_names(), vec!["wind_v"]);

        let seen = cube.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.latitude, 37.0);
        assert_eq!(seen.longitude, -122.0);
        assert_eq!(seen.variables, vec![WeatherVariable::WindV]);
        assert_eq!(seen.start_date, q.start_date());
        assert_eq!(seen.end_date, q.end_date());
    }

    #[test]
    fn test_region_query_is_unsupported() {
        let cube = RecordingCube::default();
        let q = query(Location::Region(RegionLocation {
            min_latitude: 30.0,
            min_longitude: -125.0,
            max_latitude: 40.0,
            max_longitude: -115.0,
        }));

        let err = QueryResolver::new().resolve(&q, &cube).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedQuery(_)));
        assert!(cube.seen.lock().unwrap().is_none());
    }
}
