// src/identity/allowlist.rs
//! Permitted-identity allowlist
//!
//! YAML resource of the form:
//!
//! ```yaml
//! permitted:
//!   "fe3608b7-d105-4029-8800-34b3147065b6": 7
//! ```
//!
//! Entries with an unparsable identifier or a non-integer id are skipped with
//! a warning. Reloads replace the whole map at once; concurrent readers see
//! either the old map or the new one.

use crate::identity::DurableId;
use crate::utils::errors::{Result, TelemetryError};
use parking_lot::RwLock;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const PERMITTED_KEY: &str = "permitted";

type Entries = HashMap<DurableId, i32>;

/// Process-wide allowlist of consenting subjects
pub struct Allowlist {
    source: Option<PathBuf>,
    entries: RwLock<Arc<Entries>>,
}

impl Allowlist {
    /// Allowlist with no permitted subjects and no backing file
    pub fn empty() -> Self {
        Self {
            source: None,
            entries: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Load from a YAML file. A missing file yields an empty allowlist that
    /// can be populated later with [`Allowlist::reload`].
    pub fn load(path: &Path) -> Result<Self> {
        let entries = read_entries(path)?;
        info!("Loaded {} permitted players from {}", entries.len(), path.display());

        Ok(Self {
            source: Some(path.to_path_buf()),
            entries: RwLock::new(Arc::new(entries)),
        })
    }

    /// Parse an allowlist from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(Self {
            source: None,
            entries: RwLock::new(Arc::new(parse_entries(yaml)?)),
        })
    }

    /// Re-read the backing file and replace every entry.
    ///
    /// On error the current entries stay in place.
    pub fn reload(&self) -> Result<usize> {
        let path = self.source.as_ref().ok_or_else(|| {
            TelemetryError::Configuration("Allowlist has no backing file".to_string())
        })?;

        let entries = read_entries(path)?;
        let count = entries.len();
        self.replace(entries);

        info!("Reloaded {} permitted players from {}", count, path.display());
        Ok(count)
    }

    /// Replace every entry at once
    pub fn replace(&self, entries: HashMap<DurableId, i32>) {
        *self.entries.write() = Arc::new(entries);
    }

    /// Fixed public id for a permitted subject
    pub fn public_id(&self, id: &DurableId) -> Option<i32> {
        self.entries.read().get(id).copied()
    }

    pub fn is_permitted(&self, id: &DurableId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent view of the current entries
    pub fn snapshot(&self) -> Arc<HashMap<DurableId, i32>> {
        Arc::clone(&self.entries.read())
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::empty()
    }
}

fn read_entries(path: &Path) -> Result<Entries> {
    match fs::read_to_string(path) {
        Ok(yaml) => parse_entries(&yaml),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No allowlist at {}, anonymising everyone", path.display());
            Ok(HashMap::new())
        }
        Err(e) => Err(TelemetryError::Configuration(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn parse_entries(yaml: &str) -> Result<Entries> {
    let document: Value = serde_yaml::from_str(yaml).map_err(|e| {
        TelemetryError::Configuration(format!("Allowlist is not valid YAML: {}", e))
    })?;

    let permitted = match &document {
        Value::Null => return Ok(HashMap::new()),
        Value::Mapping(root) => match root.get(PERMITTED_KEY) {
            None | Some(Value::Null) => return Ok(HashMap::new()),
            Some(Value::Mapping(permitted)) => permitted,
            Some(_) => {
                return Err(TelemetryError::Configuration(format!(
                    "Allowlist key '{}' must be a mapping",
                    PERMITTED_KEY
                )))
            }
        },
        _ => {
            return Err(TelemetryError::Configuration(
                "Allowlist root must be a mapping".to_string(),
            ))
        }
    };

    let mut entries = HashMap::with_capacity(permitted.len());
    for (key, value) in permitted {
        match parse_entry(key, value) {
            Ok((id, public_id)) => {
                entries.insert(id, public_id);
            }
            Err(e) => warn!("Skipping allowlist entry: {}", e),
        }
    }

    Ok(entries)
}

fn parse_entry(key: &Value, value: &Value) -> Result<(DurableId, i32)> {
    let raw = key.as_str().ok_or_else(|| {
        TelemetryError::Configuration(format!("Identifier {:?} is not a string", key))
    })?;

    let id = DurableId::parse_str(raw.trim()).map_err(|e| {
        TelemetryError::Configuration(format!("Invalid identifier '{}': {}", raw, e))
    })?;

    let public_id = value
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            TelemetryError::Configuration(format!(
                "Public id for {} must be a 32-bit integer, got {:?}",
                id, value
            ))
        })?;

    Ok((id, public_id))
}
