//! Closed enumerations used by queries and data cubes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Weather variable a query can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherVariable {
    Temperature,
    Pressure,
    Humidity,
    WindU,
    WindV,
}

impl WeatherVariable {
    pub const ALL: [WeatherVariable; 5] = [
        WeatherVariable::Temperature,
        WeatherVariable::Pressure,
        WeatherVariable::Humidity,
        WeatherVariable::WindU,
        WeatherVariable::WindV,
    ];

    /// Canonical name, also the fallback storage name when a cube has no rename map.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Humidity => "humidity",
            Self::WindU => "wind_u",
            Self::WindV => "wind_v",
        }
    }
}

/// Temporal granularity of the requested series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Hourly,
    ThreeHourly,
    SixHourly,
    Daily,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Hourly,
        Frequency::ThreeHourly,
        Frequency::SixHourly,
        Frequency::Daily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::ThreeHourly => "three_hourly",
            Self::SixHourly => "six_hourly",
            Self::Daily => "daily",
        }
    }
}

/// Spatial resolution of the weather model grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "3km")]
    Km3,
    #[serde(rename = "5km")]
    Km5,
    #[serde(rename = "10km")]
    Km10,
    #[serde(rename = "25km")]
    Km25,
    #[serde(rename = "50km")]
    Km50,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [
        Resolution::Km3,
        Resolution::Km5,
        Resolution::Km10,
        Resolution::Km25,
        Resolution::Km50,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Km3 => "3km",
            Self::Km5 => "5km",
            Self::Km10 => "10km",
            Self::Km25 => "25km",
            Self::Km50 => "50km",
        }
    }
}

/// Coordinate axes of a data cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coordinate {
    Latitude,
    Longitude,
    Time,
}

impl Coordinate {
    /// Name of the coordinate array inside a dataset.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Time => "time",
        }
    }

    /// Parse a dimension name, accepting the common short aliases.
    pub fn from_dimension_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "latitude" | "lat" => Some(Self::Latitude),
            "longitude" | "lon" => Some(Self::Longitude),
            "time" | "valid_time" => Some(Self::Time),
            _ => None,
        }
    }
}

macro_rules! impl_enum_text {
    ($ty:ty, $label:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CatalogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| {
                        CatalogError::validation(format!("unknown {} '{}'", $label, s))
                    })
            }
        }
    };
}

impl_enum_text!(WeatherVariable, "weather variable");
impl_enum_text!(Frequency, "frequency");
impl_enum_text!(Resolution, "resolution");

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
