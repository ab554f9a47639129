// src/utils/mod.rs
//! Shared error types and configuration

pub mod config;
pub mod errors;

pub use config::{
    CatalogConfig, FeatureDefaults, LoggingConfig, RecordingConfig, TelemetryConfig,
};
pub use errors::{Result, TelemetryError};
