// src/identity/mod.rs
//! Identity resolution
//!
//! Maps a subject's durable identifier to the id written into artifacts:
//!
//! - **Allowlist**: process-wide, read-mostly map of consenting subjects to
//!   their fixed public ids, reloadable in place
//! - **Resolver**: per-session state handing out anonymous ids (0, 1, 2, ...)
//!   to everyone else in first-seen order
//!
//! Durable identifiers are never written to an artifact.

pub mod allowlist;
pub mod resolver;

pub use allowlist::Allowlist;
pub use resolver::IdentityResolver;

/// Durable subject identifier supplied by the host
pub type DurableId = uuid::Uuid;
