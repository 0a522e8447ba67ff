//! Tabular extraction results.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use weather_common::{CatalogError, Result};

/// A named series of values, one per table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Time-indexed table: one row per time sample, one column per variable.
///
/// Missing samples (fill values) are NaN; they serialize as JSON `null`
/// and as empty CSV cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub time: Vec<DateTime<Utc>>,
    pub columns: Vec<Column>,
}

impl Table {
    /// Create an empty table over the given time index.
    pub fn new(time: Vec<DateTime<Utc>>) -> Self {
        Self {
            time,
            columns: Vec::new(),
        }
    }

    /// Append a column. Its length must match the time index.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.time.len() {
            return Err(CatalogError::data_access(format!(
                "column '{}' has {} values but the time index has {}",
                name,
                values.len(),
                self.time.len()
            )));
        }
        if self.column(&name).is_some() {
            return Err(CatalogError::data_access(format!(
                "duplicate column '{}'",
                name
            )));
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.time.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Render as CSV with a leading `time` column.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("time");
        for column in &self.columns {
            out.push(',');
            out.push_str(&column.name);
        }
        out.push('\n');

        for (row, time) in self.time.iter().enumerate() {
            out.push_str(&time.to_rfc3339_opts(SecondsFormat::Secs, true));
            for column in &self.columns {
                out.push(',');
                let value = column.values[row];
                if !value.is_nan() {
                    let _ = write!(out, "{}", value);
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn times(n: u32) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap())
            .collect()
    }

    #[test]
    fn test_push_column_length_mismatch() {
        let mut table = Table::new(times(3));
        assert!(table.push_column("temperature", vec![1.0, 2.0]).is_err());
        assert!(table.push_column("temperature", vec![1.0, 2.0, 3.0]).is_ok());
        assert!(table.push_column("temperature", vec![1.0, 2.0, 3.0]).is_err());
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.column_names(), vec!["temperature"]);
    }

    #[test]
    fn test_to_csv() {
        let mut table = Table::new(times(2));
        table.push_column("temperature", vec![280.5, f64::NAN]).unwrap();
        table.push_column("wind_u", vec![1.0, 2.0]).unwrap();

        assert_eq!(
            table.to_csv(),
            "time,temperature,wind_u\n\
             2024-01-01T00:00:00Z,280.5,1\n\
             2024-01-01T01:00:00Z,,2\n"
        );
    }

    #[test]
    fn test_json_nan_is_null() {
        let mut table = Table::new(times(1));
        table.push_column("pressure", vec![f64::NAN]).unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["columns"][0]["values"][0], serde_json::Value::Null);
    }
}
