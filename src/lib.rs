// src/lib.rs
//! Capture-the-wool match telemetry
//!
//! Records gameplay events (match lifecycle, spawns, deaths, wool objectives
//! and periodic position samples) into one Parquet file per match, and
//! anonymises every subject who has not opted in.
//!
//! # Architecture
//!
//! - **controller**: match lifecycle, feature toggles, periodic sampling
//! - **recording**: event model, row schema, artifact I/O, sessions, catalog
//! - **identity**: allowlist and per-session anonymous ids
//! - **observability**: tracing setup and metric names
//! - **utils**: configuration and errors
//!
//! # Example
//!
//! ```no_run
//! use ctw_telemetry::{SessionController, TelemetryConfig};
//! use uuid::Uuid;
//!
//! let config = TelemetryConfig::load(None)?;
//! let controller = SessionController::from_config(&config)?;
//!
//! controller.on_match_start("Airship Battle");
//! controller.log_spawn(&Uuid::new_v4(), 10, 64, 10);
//! controller.on_match_end();
//! # Ok::<(), ctw_telemetry::TelemetryError>(())
//! ```

pub mod controller;
pub mod identity;
pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use controller::{Feature, ParticipantSource, SessionController};
pub use identity::{Allowlist, DurableId, IdentityResolver};
pub use recording::{
    read_artifact, EventKind, ItemStack, MatchEvent, RecordingSession, SubjectSnapshot,
};
pub use utils::config::TelemetryConfig;
pub use utils::errors::{Result, TelemetryError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
