// src/utils/config.rs
//! Layered configuration
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Optional config file (TOML or YAML, picked by extension)
//! 3. `CTW_TELEMETRY__*` environment variables (`__` separates nesting,
//!    e.g. `CTW_TELEMETRY__FEATURES__WOOL=false`)

use crate::recording::compressor::CompressionLevel;
use crate::utils::errors::{Result, TelemetryError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CTW_TELEMETRY";

/// Top-level telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Root directory for match artifacts (`<data_root>/<map_slug>/<start>.parquet`)
    pub data_root: PathBuf,

    /// Permitted-identity allowlist (YAML)
    pub allowlist_path: PathBuf,

    /// Built-in position sampler period in seconds (0 = external scheduler only)
    pub sample_interval_secs: u64,

    /// Artifact writer settings
    pub recording: RecordingConfig,

    /// Initial feature toggle state
    pub features: FeatureDefaults,

    /// Session catalog settings
    pub catalog: CatalogConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            allowlist_path: PathBuf::from("permitted-players.yml"),
            sample_interval_secs: 5,
            recording: RecordingConfig::default(),
            features: FeatureDefaults::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Artifact writer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Rows buffered before a batch is flushed into the artifact
    pub batch_size: usize,

    /// Column chunk compression
    pub compression: CompressionLevel,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            compression: CompressionLevel::Balanced,
        }
    }
}

/// Initial state of the four logging toggles
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FeatureDefaults {
    pub positions: bool,
    pub deaths: bool,
    pub spawns: bool,
    pub wool: bool,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            positions: true,
            deaths: true,
            spawns: true,
            wool: true,
        }
    }
}

/// Session catalog configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub enabled: bool,

    /// Database file; defaults to `<data_root>/catalog.db`
    pub path: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().map_err(|e| {
            TelemetryError::Configuration(format!("Failed to read configuration: {}", e))
        })?;

        let config: TelemetryConfig = settings.try_deserialize().map_err(|e| {
            TelemetryError::Configuration(format!("Invalid configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        if self.recording.batch_size == 0 {
            return Err(TelemetryError::Configuration(
                "recording.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Period of the built-in sampler, if enabled
    pub fn sample_interval(&self) -> Option<Duration> {
        (self.sample_interval_secs > 0).then(|| Duration::from_secs(self.sample_interval_secs))
    }

    /// Resolved catalog database path, if the catalog is enabled
    pub fn catalog_path(&self) -> Option<PathBuf> {
        if !self.catalog.enabled {
            return None;
        }
        Some(
            self.catalog
                .path
                .clone()
                .unwrap_or_else(|| self.data_root.join("catalog.db")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.sample_interval(), Some(Duration::from_secs(5)));
        assert_eq!(config.recording.batch_size, 1024);
        assert!(config.features.positions && config.features.wool);
        assert_eq!(config.catalog_path(), Some(PathBuf::from("data/catalog.db")));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
data_root = "/srv/ctw"
sample_interval_secs = 0

[recording]
batch_size = 16
compression = "best"

[features]
wool = false

[catalog]
enabled = false
"#
        )
        .unwrap();

        let config = TelemetryConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/srv/ctw"));
        assert_eq!(config.sample_interval(), None);
        assert_eq!(config.recording.batch_size, 16);
        assert_eq!(config.recording.compression, CompressionLevel::Best);
        assert!(!config.features.wool);
        assert!(config.features.deaths);
        assert_eq!(config.catalog_path(), None);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[recording]\nbatch_size = 0").unwrap();

        let result = TelemetryConfig::load(Some(file.path()));
        assert!(matches!(result, Err(TelemetryError::Configuration(_))));
    }
}
