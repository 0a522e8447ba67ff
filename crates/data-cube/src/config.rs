//! Configuration for writing data cubes.

use serde::{Deserialize, Serialize};

/// Chunking and compression settings used when a cube is written to Zarr.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeWriterConfig {
    /// Chunk length along the time axis.
    pub time_chunk: usize,

    /// Chunk length along each spatial axis.
    pub spatial_chunk: usize,

    /// Compression codec for variable and coordinate arrays.
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,
}

impl Default for CubeWriterConfig {
    fn default() -> Self {
        Self {
            time_chunk: 24,
            spatial_chunk: 64,
            compression: ZarrCompression::BloscZstd,
            compression_level: 1,
            shuffle: true,
        }
    }
}

impl CubeWriterConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override individual settings from `CUBE_*`/`ZARR_*` environment
    /// variables. Unset variables leave the current value in place.
    pub fn apply_env(&mut self) -> Result<(), String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override individual settings from `lookup`, keyed by environment
    /// variable name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), String> {
        if let Some(val) = lookup("CUBE_TIME_CHUNK") {
            self.time_chunk = parse_var("CUBE_TIME_CHUNK", &val)?;
        }

        if let Some(val) = lookup("CUBE_SPATIAL_CHUNK") {
            self.spatial_chunk = parse_var("CUBE_SPATIAL_CHUNK", &val)?;
        }

        if let Some(val) = lookup("ZARR_COMPRESSION") {
            self.compression = ZarrCompression::parse(&val)?;
        }

        if let Some(val) = lookup("ZARR_COMPRESSION_LEVEL") {
            self.compression_level = parse_var("ZARR_COMPRESSION_LEVEL", &val)?;
        }

        if let Some(val) = lookup("ZARR_SHUFFLE") {
            self.shuffle = match val.trim().to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(format!("ZARR_SHUFFLE: expected a boolean, got '{}'", val)),
            };
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.time_chunk == 0 {
            return Err("time_chunk must be > 0".to_string());
        }

        if self.spatial_chunk == 0 {
            return Err("spatial_chunk must be > 0".to_string());
        }

        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("compression_level must be 1-9".to_string());
        }

        Ok(())
    }
}

/// Compression codec for Zarr arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lz4" | "blosc_lz4" => Ok(Self::BloscLz4),
            "zstd" | "blosc_zstd" => Ok(Self::BloscZstd),
            other => Err(format!("unknown zarr compression '{}'", other)),
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, String> {
    val.trim()
        .parse()
        .map_err(|_| format!("{}: invalid value '{}'", key, val))
}
