// src/utils/errors.rs
//! Error taxonomy for the telemetry core
//!
//! Constructors and readers return these errors. The recording and controller
//! entry points never hand them to the host: they log and drop the affected
//! telemetry instead.

use thiserror::Error;

/// Errors produced by the telemetry core
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Malformed allowlist entry or configuration source
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Artifact could not be created, written, finalised or read
    #[error("artifact I/O error: {0}")]
    ArtifactIo(String),

    /// A field was supplied that is illegal for the event kind, or a
    /// required one was missing
    #[error("invalid event construction: {0}")]
    InvalidEvent(String),

    /// A persisted ordinal that this build does not know
    #[error("unknown event kind ordinal {0}")]
    UnknownEventKind(i32),

    /// Session catalog failure
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Export failure
    #[error("export failed: {0}")]
    ExportFailed(String),
}

impl From<parquet::errors::ParquetError> for TelemetryError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        TelemetryError::ArtifactIo(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for TelemetryError {
    fn from(e: arrow::error::ArrowError) -> Self {
        TelemetryError::ArtifactIo(e.to_string())
    }
}

impl From<rusqlite::Error> for TelemetryError {
    fn from(e: rusqlite::Error) -> Self {
        TelemetryError::Catalog(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TelemetryError::UnknownEventKind(42);
        assert_eq!(err.to_string(), "unknown event kind ordinal 42");

        let err = TelemetryError::InvalidEvent("killer_id on Spawn".into());
        assert!(err.to_string().contains("killer_id on Spawn"));
    }

    #[test]
    fn test_parquet_error_maps_to_artifact_io() {
        let err: TelemetryError = parquet::errors::ParquetError::General("boom".into()).into();
        assert!(matches!(err, TelemetryError::ArtifactIo(msg) if msg.contains("boom")));
    }
}
