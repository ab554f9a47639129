// src/recording/session.rs
//! Per-match recording session
//!
//! A session owns one artifact from `MatchStart` to `MatchEnd`. Every mutating
//! call takes the session mutex, so rows from the event thread and the
//! sampler thread never interleave, and `close` waits for any in-flight write.
//!
//! Logging calls never return errors. A row that cannot be written is logged,
//! counted as dropped and the session stays usable.

use crate::identity::{Allowlist, DurableId, IdentityResolver};
use crate::observability::{EVENTS_DROPPED, EVENTS_WRITTEN, SAMPLES_SUPPRESSED};
use crate::recording::artifact::{ArtifactOptions, ArtifactSummary, ArtifactWriter};
use crate::recording::clock::Clock;
use crate::recording::event::{BlockPos, MatchEvent};
use crate::recording::objective::objective_id;
use crate::recording::schema;
use crate::recording::subject::SubjectSnapshot;
use crate::utils::errors::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Rows accepted by the session
    pub events_recorded: u64,

    /// Rows written to the artifact as complete row groups
    pub events_flushed: u64,

    /// Rows lost to write failures or logged after close
    pub events_dropped: u64,

    /// Position samples skipped because the block did not change
    pub samples_suppressed: u64,

    pub batches_flushed: u64,

    /// Artifact size, known once closed
    pub bytes_written: Option<u64>,

    pub anonymous_subjects: usize,
}

struct SessionState {
    writer: Option<ArtifactWriter>,
    resolver: IdentityResolver,
    last_positions: HashMap<DurableId, BlockPos>,
    events_recorded: u64,
    dropped_after_close: u64,
    samples_suppressed: u64,
    closed: Option<ClosedSummary>,
}

#[derive(Debug, Clone)]
struct ClosedSummary {
    rows_flushed: u64,
    rows_dropped: u64,
    batches_flushed: u64,
    size_bytes: Option<u64>,
    ended_at: DateTime<Utc>,
}

/// Recording for one match
pub struct RecordingSession {
    id: Ulid,
    path: PathBuf,
    map_name: Option<String>,
    started_at: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    opened_at: Duration,
    state: Mutex<SessionState>,
}

impl RecordingSession {
    /// Create the artifact and write `MatchStart` at timestamp 0
    pub fn open(
        path: &Path,
        map_name: Option<String>,
        allowlist: Arc<Allowlist>,
        clock: Arc<dyn Clock>,
        options: ArtifactOptions,
    ) -> Result<Self> {
        let writer = ArtifactWriter::create(path, options)?;
        Self::start(writer, map_name, allowlist, clock)
    }

    fn start(
        mut writer: ArtifactWriter,
        map_name: Option<String>,
        allowlist: Arc<Allowlist>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let opened_at = clock.now();

        if let Err(e) = writer.append(schema::encode(&MatchEvent::match_start(map_name.clone()))) {
            writer.discard();
            return Err(e);
        }

        let session = Self {
            id: Ulid::new(),
            path: writer.path().to_path_buf(),
            map_name,
            started_at: Utc::now(),
            clock,
            opened_at,
            state: Mutex::new(SessionState {
                writer: Some(writer),
                resolver: IdentityResolver::new(allowlist),
                last_positions: HashMap::new(),
                events_recorded: 1,
                dropped_after_close: 0,
                samples_suppressed: 0,
                closed: None,
            }),
        };
        counter!(EVENTS_WRITTEN, "kind" => "match_start").increment(1);

        info!(
            "Opened session {} for {} at {}",
            session.id,
            session.map_name.as_deref().unwrap_or("unknown map"),
            session.path.display()
        );

        Ok(session)
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    /// Final artifact path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn map_name(&self) -> Option<&str> {
        self.map_name.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock close time, once closed
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().closed.as_ref().map(|c| c.ended_at)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().writer.is_none()
    }

    /// Whole seconds since open, truncated
    fn timestamp(&self) -> i32 {
        let elapsed = self.clock.now().saturating_sub(self.opened_at);
        i32::try_from(elapsed.as_secs()).unwrap_or(i32::MAX)
    }

    pub fn log_spawn(&self, subject: &DurableId, pos: BlockPos) {
        let mut state = self.state.lock();
        if !state.is_open() {
            state.drop_after_close("spawn");
            return;
        }

        let subject_id = state.resolver.resolve(subject);
        state.last_positions.remove(subject);

        let event = MatchEvent::spawn(self.timestamp(), subject_id, pos);
        state.append(event);
    }

    pub fn log_death(&self, subject: &DurableId, pos: BlockPos, killer: Option<&DurableId>) {
        let mut state = self.state.lock();
        if !state.is_open() {
            state.drop_after_close("death");
            return;
        }

        let subject_id = state.resolver.resolve(subject);
        let killer_id = killer.map(|k| state.resolver.resolve(k));

        let event = MatchEvent::death(self.timestamp(), subject_id, pos, killer_id);
        state.append(event);
    }

    pub fn log_wool_touch(&self, subject: &DurableId, pos: BlockPos, color: &str) {
        let mut state = self.state.lock();
        if !state.is_open() {
            state.drop_after_close("wool_touch");
            return;
        }

        let subject_id = state.resolver.resolve(subject);
        let event = MatchEvent::wool_touch(self.timestamp(), subject_id, pos, Some(objective_id(color)));
        state.append(event);
    }

    pub fn log_wool_capture(&self, subject: &DurableId, pos: BlockPos, color: &str) {
        let mut state = self.state.lock();
        if !state.is_open() {
            state.drop_after_close("wool_capture");
            return;
        }

        let subject_id = state.resolver.resolve(subject);
        let event = MatchEvent::wool_capture(self.timestamp(), subject_id, pos, Some(objective_id(color)));
        state.append(event);
    }

    /// Record a position row for every subject whose block changed since its
    /// last sample. Returns the number of rows emitted.
    pub fn sample(&self, subjects: &[SubjectSnapshot]) -> usize {
        let mut state = self.state.lock();
        if !state.is_open() {
            return 0;
        }

        let timestamp = self.timestamp();
        let mut emitted = 0;

        for subject in subjects {
            let pos = subject.block_pos();
            if state.last_positions.get(&subject.id) == Some(&pos) {
                state.samples_suppressed += 1;
                counter!(SAMPLES_SUPPRESSED).increment(1);
                continue;
            }
            state.last_positions.insert(subject.id, pos);

            let subject_id = state.resolver.resolve(&subject.id);
            let event = MatchEvent::position(
                timestamp,
                subject_id,
                pos,
                subject.held_item,
                subject.carried_count(),
            );
            state.append(event);
            emitted += 1;
        }

        debug!("Sampled {} subjects, {} rows emitted", subjects.len(), emitted);
        emitted
    }

    /// Write `MatchEnd` and finalise the artifact.
    ///
    /// Returns `None` if the session was already closed or finalising failed.
    pub fn close(&self) -> Option<ArtifactSummary> {
        let mut state = self.state.lock();
        if !state.is_open() {
            return None;
        }

        let event = MatchEvent::match_end(self.timestamp());
        state.append(event);

        let writer = state.writer.take()?;
        let batches_flushed = writer.batches_written() + u64::from(writer.buffered() > 0);
        let rows_dropped = writer.rows_dropped();
        let ended_at = Utc::now();

        match writer.finish() {
            Ok(summary) => {
                info!(
                    "Closed session {}: {} rows, {} bytes at {}",
                    self.id,
                    summary.rows_written,
                    summary.size_bytes,
                    summary.path.display()
                );
                state.closed = Some(ClosedSummary {
                    rows_flushed: summary.rows_written,
                    rows_dropped,
                    batches_flushed,
                    size_bytes: Some(summary.size_bytes),
                    ended_at,
                });
                Some(summary)
            }
            Err(e) => {
                error!("Failed to finalise {}: {}", self.path.display(), e);
                state.closed = Some(ClosedSummary {
                    rows_flushed: 0,
                    rows_dropped: state.events_recorded,
                    batches_flushed: 0,
                    size_bytes: None,
                    ended_at,
                });
                None
            }
        }
    }

    /// Statistics snapshot
    pub fn stats(&self) -> SessionStats {
        let state = self.state.lock();

        let (events_flushed, rows_dropped, batches_flushed, bytes_written) =
            match (&state.writer, &state.closed) {
                (Some(writer), _) => (
                    writer.rows_written(),
                    writer.rows_dropped(),
                    writer.batches_written(),
                    None,
                ),
                (None, Some(closed)) => (
                    closed.rows_flushed,
                    closed.rows_dropped,
                    closed.batches_flushed,
                    closed.size_bytes,
                ),
                (None, None) => (0, 0, 0, None),
            };

        SessionStats {
            events_recorded: state.events_recorded,
            events_flushed,
            events_dropped: rows_dropped + state.dropped_after_close,
            samples_suppressed: state.samples_suppressed,
            batches_flushed,
            bytes_written,
            anonymous_subjects: state.resolver.anonymous_count(),
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!("Session {} dropped while open, closing", self.id);
            self.close();
        }
    }
}

impl SessionState {
    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn drop_after_close(&mut self, kind: &'static str) {
        debug!("Ignoring {} on closed session", kind);
        self.dropped_after_close += 1;
        counter!(EVENTS_DROPPED, "kind" => kind).increment(1);
    }

    fn append(&mut self, event: MatchEvent) {
        let kind = event.kind().as_str();
        let Some(writer) = self.writer.as_mut() else {
            self.drop_after_close(kind);
            return;
        };

        let buffered = writer.buffered() as u64 + 1;
        match writer.append(schema::encode(&event)) {
            Ok(()) => {
                self.events_recorded += 1;
                counter!(EVENTS_WRITTEN, "kind" => kind).increment(1);
            }
            Err(e) => {
                self.events_recorded += 1;
                warn!("Dropped {} rows from {}: {}", buffered, writer.path().display(), e);
                counter!(EVENTS_DROPPED, "kind" => kind).increment(buffered);
            }
        }
    }
}
