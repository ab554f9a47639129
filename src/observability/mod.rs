// src/observability/mod.rs
//! Logging and metrics
//!
//! The library only emits through the `tracing` and `metrics` facades. The
//! host decides where they go; [`init_tracing`] is a convenience for binaries
//! and standalone hosts.

use crate::utils::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Rows accepted into an artifact, labelled by `kind`
pub const EVENTS_WRITTEN: &str = "ctw_telemetry_events_written_total";

/// Rows lost to write failures or logged after close, labelled by `kind`
pub const EVENTS_DROPPED: &str = "ctw_telemetry_events_dropped_total";

/// Position samples skipped because the subject stayed in the same block
pub const SAMPLES_SUPPRESSED: &str = "ctw_telemetry_samples_suppressed_total";

pub const SESSIONS_OPENED: &str = "ctw_telemetry_sessions_opened_total";

/// Matches that recorded nothing because the artifact could not be opened
pub const SESSIONS_FAILED: &str = "ctw_telemetry_sessions_failed_total";

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Returns `false` if a
/// subscriber was already installed, in which case nothing changes.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!("Tracing initialised (json: {})", config.json);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = LoggingConfig::default();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }

    #[test]
    fn test_bad_level_falls_back() {
        let config = LoggingConfig {
            level: "not a [valid directive".to_string(),
            json: true,
        };
        // Must not panic whether or not a subscriber is already installed.
        init_tracing(&config);
    }
}
