// src/recording/catalog.rs
//! Session catalog
//!
//! SQLite index of finished recordings, one row per closed session. The
//! artifacts themselves stay on disk; the catalog only records where they
//! are and what they contain.

use crate::recording::session::RecordingSession;
use crate::utils::errors::{Result, TelemetryError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Catalog row for one closed recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingEntry {
    pub session_id: String,
    pub map_name: Option<String>,
    pub map_slug: String,
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub event_count: u64,
    pub dropped_count: u64,
    pub size_bytes: u64,
}

impl RecordingEntry {
    /// Entry for a closed session, `None` while it is still open
    pub fn from_session(session: &RecordingSession, map_slug: &str) -> Option<Self> {
        let ended_at = session.ended_at()?;
        let stats = session.stats();

        Some(Self {
            session_id: session.id().to_string(),
            map_name: session.map_name().map(str::to_string),
            map_slug: map_slug.to_string(),
            path: session.path().to_path_buf(),
            started_at: session.started_at(),
            ended_at,
            event_count: stats.events_flushed,
            dropped_count: stats.events_dropped,
            size_bytes: stats.bytes_written.unwrap_or(0),
        })
    }
}

/// Catalog totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub recordings: u64,
    pub total_events: u64,
    pub total_size_bytes: u64,
}

/// SQLite-backed recording index
pub struct SessionCatalog {
    db: Mutex<Connection>,
}

impl SessionCatalog {
    /// Open (or create) the catalog database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TelemetryError::Catalog(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            TelemetryError::Catalog(format!("Failed to open database: {}", e))
        })?;

        let catalog = Self {
            db: Mutex::new(conn),
        };
        catalog.init_schema()?;

        info!("Session catalog opened at {}", path.display());
        Ok(catalog)
    }

    /// Catalog that lives only as long as this value
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            TelemetryError::Catalog(format!("Failed to open database: {}", e))
        })?;

        let catalog = Self {
            db: Mutex::new(conn),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.db.lock();

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                session_id TEXT PRIMARY KEY,
                map_name TEXT,
                map_slug TEXT NOT NULL,
                path TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                ended_at INTEGER NOT NULL,
                event_count INTEGER NOT NULL,
                dropped_count INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| TelemetryError::Catalog(format!("Schema creation failed: {}", e)))?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_map_slug ON recordings(map_slug, started_at)",
            [],
        )
        .map_err(|e| TelemetryError::Catalog(format!("Index creation failed: {}", e)))?;

        Ok(())
    }

    /// Insert or replace the entry for a session
    pub fn record(&self, entry: &RecordingEntry) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            r#"
            INSERT OR REPLACE INTO recordings
                (session_id, map_name, map_slug, path, started_at, ended_at,
                 event_count, dropped_count, size_bytes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.session_id,
                entry.map_name,
                entry.map_slug,
                entry.path.to_string_lossy(),
                entry.started_at.timestamp_millis(),
                entry.ended_at.timestamp_millis(),
                entry.event_count as i64,
                entry.dropped_count as i64,
                entry.size_bytes as i64,
            ],
        )
        .map_err(|e| TelemetryError::Catalog(format!("Failed to record session: {}", e)))?;

        debug!("Catalogued session {} ({})", entry.session_id, entry.map_slug);
        Ok(())
    }

    /// Every recording, oldest first
    pub fn list(&self) -> Result<Vec<RecordingEntry>> {
        self.query(
            "SELECT session_id, map_name, map_slug, path, started_at, ended_at, \
             event_count, dropped_count, size_bytes FROM recordings ORDER BY started_at",
            None,
        )
    }

    /// Recordings of one map, oldest first
    pub fn list_for_map(&self, map_slug: &str) -> Result<Vec<RecordingEntry>> {
        self.query(
            "SELECT session_id, map_name, map_slug, path, started_at, ended_at, \
             event_count, dropped_count, size_bytes FROM recordings \
             WHERE map_slug = ?1 ORDER BY started_at",
            Some(map_slug),
        )
    }

    fn query(&self, sql: &str, map_slug: Option<&str>) -> Result<Vec<RecordingEntry>> {
        let db = self.db.lock();

        let mut stmt = db.prepare(sql).map_err(|e| {
            TelemetryError::Catalog(format!("Query preparation failed: {}", e))
        })?;

        let rows = match map_slug {
            Some(slug) => stmt.query_map(params![slug], entry_from_row),
            None => stmt.query_map([], entry_from_row),
        }
        .map_err(|e| TelemetryError::Catalog(format!("Query execution failed: {}", e)))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TelemetryError::Catalog(format!("Result collection failed: {}", e)))
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let db = self.db.lock();

        let (recordings, total_events, total_size): (i64, i64, i64) = db
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(event_count), 0), COALESCE(SUM(size_bytes), 0) \
                 FROM recordings",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| TelemetryError::Catalog(format!("Stats query failed: {}", e)))?;

        Ok(CatalogStats {
            recordings: recordings as u64,
            total_events: total_events as u64,
            total_size_bytes: total_size as u64,
        })
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<RecordingEntry> {
    let path: String = row.get(3)?;
    let started_at: i64 = row.get(4)?;
    let ended_at: i64 = row.get(5)?;
    let event_count: i64 = row.get(6)?;
    let dropped_count: i64 = row.get(7)?;
    let size_bytes: i64 = row.get(8)?;

    Ok(RecordingEntry {
        session_id: row.get(0)?,
        map_name: row.get(1)?,
        map_slug: row.get(2)?,
        path: PathBuf::from(path),
        started_at: millis_to_datetime(started_at),
        ended_at: millis_to_datetime(ended_at),
        event_count: event_count as u64,
        dropped_count: dropped_count as u64,
        size_bytes: size_bytes as u64,
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
