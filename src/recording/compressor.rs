// src/recording/compressor.rs
//! Column chunk compression for match artifacts
//!
//! Artifacts are compressed per column chunk with zstd inside the Parquet
//! container, so no separate compression pass is needed.

use crate::utils::errors::{Result, TelemetryError};
use parquet::basic::{Compression, ZstdLevel};
use serde::Deserialize;

/// Compression levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Uncompressed column chunks
    None,

    /// Fast compression (level 1)
    Fast,

    /// Balanced (level 3)
    Balanced,

    /// Best compression (level 19)
    Best,
}

impl CompressionLevel {
    pub fn as_i32(&self) -> i32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 3,
            CompressionLevel::Best => 19,
        }
    }

    /// Parquet codec for this level
    pub fn codec(&self) -> Result<Compression> {
        if *self == CompressionLevel::None {
            return Ok(Compression::UNCOMPRESSED);
        }

        let level = ZstdLevel::try_new(self.as_i32()).map_err(|e| {
            TelemetryError::Configuration(format!("Invalid zstd level {}: {}", self.as_i32(), e))
        })?;

        Ok(Compression::ZSTD(level))
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Balanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_levels() {
        assert_eq!(CompressionLevel::None.as_i32(), 0);
        assert_eq!(CompressionLevel::Fast.as_i32(), 1);
        assert_eq!(CompressionLevel::Balanced.as_i32(), 3);
        assert_eq!(CompressionLevel::Best.as_i32(), 19);
    }

    #[test]
    fn test_codecs() {
        assert_eq!(
            CompressionLevel::None.codec().unwrap(),
            Compression::UNCOMPRESSED
        );
        assert!(matches!(
            CompressionLevel::Best.codec().unwrap(),
            Compression::ZSTD(_)
        ));
    }
}
