// src/controller/mod.rs
//! Session lifecycle
//!
//! The surface the host adapter talks to:
//!
//! - **Lifecycle**: match start/end, gated logging calls, status
//! - **Features**: positions/deaths/spawns/wool toggles
//! - **Sampler**: background thread for periodic position samples
//! - **Slug**: map slug and artifact file naming

pub mod features;
pub mod lifecycle;
pub mod sampler;
pub mod slug;

pub use features::{Feature, FeatureState, FeatureToggles};
pub use lifecycle::{ControllerStatus, RecordingStatus, SessionController};
pub use sampler::{ParticipantSource, Sampler};
pub use slug::{artifact_path, map_slug};
