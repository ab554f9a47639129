// src/recording/mod.rs
//! Match recording and storage
//!
//! This module turns gameplay callbacks into one columnar artifact per match:
//!
//! - **Event**: typed match events and their kind ordinals
//! - **Schema**: fixed row schema, row encoding and decoding
//! - **Artifact**: buffered Parquet writer and reader
//! - **Session**: per-match recording with identity resolution and downsampling
//! - **Catalog**: SQLite index of closed recordings
//! - **Exporter**: export decoded recordings to JSON or CSV
//!
//! # Architecture
//!
//! ```text
//! log_death() → Session (lock) → resolve ids → MatchEvent
//!                                                  ↓
//!                                             encode (row)
//!                                                  ↓
//!                                      Batch (1024 rows) → ArrowWriter
//!                                                  ↓
//!                                  close() → footer → rename .partial
//! ```

pub mod artifact;
pub mod catalog;
pub mod clock;
pub mod compressor;
pub mod event;
pub mod exporter;
pub mod objective;
pub mod schema;
pub mod session;
pub mod subject;

// Re-export commonly used types
pub use artifact::{read_artifact, ArtifactContents, ArtifactOptions, ArtifactSummary, ArtifactWriter};
pub use catalog::{CatalogStats, RecordingEntry, SessionCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compressor::CompressionLevel;
pub use event::{BlockPos, EventBody, EventFields, EventKind, Field, MatchEvent};
pub use exporter::{ExportFormat, Exporter};
pub use objective::{objective_id, UNKNOWN_OBJECTIVE};
pub use schema::EventRow;
pub use session::{RecordingSession, SessionStats};
pub use subject::{ItemStack, SubjectSnapshot};
