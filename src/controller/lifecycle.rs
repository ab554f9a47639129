// src/controller/lifecycle.rs
//! Session lifecycle controller
//!
//! Two states: idle (no session) and recording (one live session). Match
//! boundaries move between them; typed logging calls from the host adapter
//! are gated by the feature toggles and routed into the live session.
//!
//! Nothing here returns an error to the host. A match whose artifact cannot
//! be opened is logged and records nothing.

use crate::controller::features::{Feature, FeatureState, FeatureToggles};
use crate::controller::sampler::{ParticipantSource, Sampler};
use crate::controller::slug::{artifact_path, map_slug};
use crate::identity::{Allowlist, DurableId};
use crate::observability::{SESSIONS_FAILED, SESSIONS_OPENED};
use crate::recording::artifact::{ArtifactOptions, ArtifactSummary};
use crate::recording::catalog::{RecordingEntry, SessionCatalog};
use crate::recording::clock::{Clock, SystemClock};
use crate::recording::event::BlockPos;
use crate::recording::session::{RecordingSession, SessionStats};
use crate::recording::subject::SubjectSnapshot;
use crate::utils::config::TelemetryConfig;
use crate::utils::errors::Result;
use chrono::Local;
use metrics::counter;
use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

struct ActiveSession {
    session: Arc<RecordingSession>,
    slug: String,
    sampler: Option<Sampler>,
}

/// Current controller state, for status reporting
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    pub features: FeatureState,
    pub recording: Option<RecordingStatus>,
}

#[derive(Debug, Clone)]
pub struct RecordingStatus {
    pub file_name: String,
    pub map_name: Option<String>,
    pub stats: SessionStats,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for feature in Feature::INDIVIDUAL {
            let state = if self.features.get(feature) { "ON" } else { "OFF" };
            writeln!(f, "{}: {}", feature, state)?;
        }
        match &self.recording {
            Some(recording) => write!(
                f,
                "Currently recording: {} ({} events, {} dropped)",
                recording.file_name,
                recording.stats.events_recorded,
                recording.stats.events_dropped
            ),
            None => write!(f, "Not recording (no active match)."),
        }
    }
}

/// Owns the live session and the feature toggles
pub struct SessionController {
    data_root: PathBuf,
    allowlist: Arc<Allowlist>,
    clock: Arc<dyn Clock>,
    artifact_options: ArtifactOptions,
    sample_interval: Option<Duration>,
    toggles: Arc<FeatureToggles>,
    catalog: Option<SessionCatalog>,
    participants: Option<Arc<dyn ParticipantSource>>,
    active: RwLock<Option<ActiveSession>>,
}

impl SessionController {
    /// Controller for `config`, sharing an already loaded allowlist.
    ///
    /// The catalog is opened here if enabled; if that fails recording still
    /// works, just without the index.
    pub fn new(config: &TelemetryConfig, allowlist: Arc<Allowlist>) -> Self {
        let catalog = match config.catalog_path() {
            Some(path) => match SessionCatalog::open(&path) {
                Ok(catalog) => Some(catalog),
                Err(e) => {
                    warn!("Session catalog disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        Self {
            data_root: config.data_root.clone(),
            allowlist,
            clock: Arc::new(SystemClock::new()),
            artifact_options: ArtifactOptions {
                batch_size: config.recording.batch_size,
                compression: config.recording.compression,
            },
            sample_interval: config.sample_interval(),
            toggles: Arc::new(FeatureToggles::new(config.features)),
            catalog,
            participants: None,
            active: RwLock::new(None),
        }
    }

    /// Controller with the allowlist loaded from `config.allowlist_path`
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        let allowlist = Arc::new(Allowlist::load(&config.allowlist_path)?);
        Ok(Self::new(config, allowlist))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enables the built-in sampler for matches started after this call
    pub fn with_participants(mut self, source: Arc<dyn ParticipantSource>) -> Self {
        self.participants = Some(source);
        self
    }

    pub fn with_catalog(mut self, catalog: SessionCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn allowlist(&self) -> &Arc<Allowlist> {
        &self.allowlist
    }

    pub fn catalog(&self) -> Option<&SessionCatalog> {
        self.catalog.as_ref()
    }

    /// Re-read the allowlist; later resolutions see the new entries
    pub fn reload_allowlist(&self) -> Result<usize> {
        self.allowlist.reload()
    }

    pub fn is_recording(&self) -> bool {
        self.active.read().is_some()
    }

    /// Live session, if any
    pub fn active_session(&self) -> Option<Arc<RecordingSession>> {
        self.active.read().as_ref().map(|a| Arc::clone(&a.session))
    }

    /// Start recording a match. Returns whether a session is now live.
    ///
    /// A session still open from a previous match is closed first.
    pub fn on_match_start(&self, map_name: &str) -> bool {
        let mut active = self.active.write();

        if let Some(previous) = active.take() {
            warn!(
                "Match started while {} was still recording, closing it",
                previous.session.file_name()
            );
            self.finish(previous);
        }

        let slug = map_slug(map_name);
        let path = artifact_path(&self.data_root, &slug, Local::now().naive_local());

        let session = match RecordingSession::open(
            &path,
            Some(map_name.to_string()),
            Arc::clone(&self.allowlist),
            Arc::clone(&self.clock),
            self.artifact_options,
        ) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                error!("Failed to open artifact for {}: {}", map_name, e);
                counter!(SESSIONS_FAILED).increment(1);
                return false;
            }
        };
        counter!(SESSIONS_OPENED).increment(1);
        info!("Match started on {}, recording to {}", map_name, path.display());

        let sampler = match (self.sample_interval, &self.participants) {
            (Some(interval), Some(source)) => match Sampler::spawn(
                interval,
                Arc::clone(&session),
                Arc::clone(source),
                Arc::clone(&self.toggles),
            ) {
                Ok(sampler) => Some(sampler),
                Err(e) => {
                    warn!("Recording without position sampling: {}", e);
                    None
                }
            },
            _ => None,
        };

        *active = Some(ActiveSession {
            session,
            slug,
            sampler,
        });
        true
    }

    /// Stop sampling and close the live session.
    ///
    /// The slot stays locked until the artifact is finalised, so a new match
    /// cannot open its session while this one is still closing.
    pub fn on_match_end(&self) -> Option<ArtifactSummary> {
        let mut active = self.active.write();
        match active.take() {
            Some(finished) => self.finish(finished),
            None => {
                debug!("Match ended with no active recording");
                None
            }
        }
    }

    fn finish(&self, active: ActiveSession) -> Option<ArtifactSummary> {
        if let Some(sampler) = active.sampler {
            sampler.stop();
        }

        let summary = active.session.close()?;
        info!("Match ended, data saved to {}", summary.path.display());

        if let (Some(catalog), Some(entry)) = (
            &self.catalog,
            RecordingEntry::from_session(&active.session, &active.slug),
        ) {
            if let Err(e) = catalog.record(&entry) {
                warn!("Failed to catalogue {}: {}", entry.path.display(), e);
            }
        }

        Some(summary)
    }

    /// Live session if `feature` is enabled
    fn gated(&self, feature: Feature) -> Option<Arc<RecordingSession>> {
        if !self.toggles.is_enabled(feature) {
            return None;
        }
        self.active_session()
    }

    pub fn log_spawn(&self, subject: &DurableId, x: i32, y: i32, z: i32) {
        if let Some(session) = self.gated(Feature::Spawns) {
            session.log_spawn(subject, BlockPos::new(x, y, z));
        }
    }

    pub fn log_death(&self, subject: &DurableId, x: i32, y: i32, z: i32, killer: Option<&DurableId>) {
        if let Some(session) = self.gated(Feature::Deaths) {
            session.log_death(subject, BlockPos::new(x, y, z), killer);
        }
    }

    pub fn log_wool_touch(&self, subject: &DurableId, x: i32, y: i32, z: i32, color: &str) {
        if let Some(session) = self.gated(Feature::Wool) {
            session.log_wool_touch(subject, BlockPos::new(x, y, z), color);
        }
    }

    pub fn log_wool_capture(&self, subject: &DurableId, x: i32, y: i32, z: i32, color: &str) {
        if let Some(session) = self.gated(Feature::Wool) {
            session.log_wool_capture(subject, BlockPos::new(x, y, z), color);
        }
    }

    /// Sample the given participants. Returns the number of position rows written.
    pub fn sample_all(&self, subjects: &[SubjectSnapshot]) -> usize {
        match self.gated(Feature::Positions) {
            Some(session) => session.sample(subjects),
            None => 0,
        }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.toggles.is_enabled(feature)
    }

    pub fn set_enabled(&self, feature: Feature, enabled: bool) {
        self.toggles.set_enabled(feature, enabled);
        info!("{} logging: {}", feature, if enabled { "ON" } else { "OFF" });
    }

    /// Flip a feature and return its new state
    pub fn toggle(&self, feature: Feature) -> bool {
        let enabled = self.toggles.toggle(feature);
        info!("{} logging: {}", feature, if enabled { "ON" } else { "OFF" });
        enabled
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            features: self.toggles.state(),
            recording: self.active_session().map(|session| RecordingStatus {
                file_name: session.file_name(),
                map_name: session.map_name().map(str::to_string),
                stats: session.stats(),
            }),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            info!("Shutting down, closing {}", active.session.file_name());
            self.finish(active);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::artifact::read_artifact;
    use crate::recording::clock::ManualClock;
    use crate::recording::event::{EventKind, MatchEvent};
    use crate::utils::config::CatalogConfig;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn config(dir: &TempDir) -> TelemetryConfig {
        TelemetryConfig {
            data_root: dir.path().join("data"),
            allowlist_path: dir.path().join("permitted-players.yml"),
            sample_interval_secs: 0,
            catalog: CatalogConfig {
                enabled: false,
                path: None,
            },
            ..TelemetryConfig::default()
        }
    }

    fn controller(dir: &TempDir) -> (SessionController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let controller = SessionController::new(&config(dir), Arc::new(Allowlist::empty()))
            .with_clock(clock.clone());
        (controller, clock)
    }

    fn uuid(n: u128) -> DurableId {
        DurableId::from_u128(n)
    }

    #[test]
    fn test_match_lifecycle() {
        let dir = tempdir().unwrap();
        let (controller, clock) = controller(&dir);
        assert!(!controller.is_recording());

        assert!(controller.on_match_start("Airship Battle"));
        assert!(controller.is_recording());

        controller.log_spawn(&uuid(1), 10, 64, 10);
        clock.advance(Duration::from_secs(90));
        controller.log_death(&uuid(1), 12, 64, 10, Some(&uuid(2)));

        let summary = controller.on_match_end().unwrap();
        assert!(!controller.is_recording());
        assert!(controller.on_match_end().is_none());
        assert!(summary.path.starts_with(dir.path().join("data").join("airship_battle")));

        let events = read_artifact(&summary.path).unwrap().events;
        assert_eq!(
            events,
            vec![
                MatchEvent::match_start(Some("Airship Battle".to_string())),
                MatchEvent::spawn(0, 0, BlockPos::new(10, 64, 10)),
                MatchEvent::death(90, 0, BlockPos::new(12, 64, 10), Some(1)),
                MatchEvent::match_end(90),
            ]
        );
    }

    #[test]
    fn test_calls_while_idle_are_ignored() {
        let dir = tempdir().unwrap();
        let (controller, _) = controller(&dir);

        controller.log_spawn(&uuid(1), 0, 0, 0);
        assert_eq!(controller.sample_all(&[SubjectSnapshot::new(uuid(1), 0.0, 0.0, 0.0)]), 0);
        assert!(controller.on_match_end().is_none());
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_disabled_feature_has_no_resolver_side_effect() {
        let dir = tempdir().unwrap();
        let (controller, _) = controller(&dir);
        controller.on_match_start("Twin Peaks");
        controller.set_enabled(Feature::Wool, false);

        controller.log_wool_touch(&uuid(1), 0, 60, 0, "RED");
        controller.log_wool_capture(&uuid(1), 0, 60, 0, "RED");
        let session = controller.active_session().unwrap();
        assert_eq!(session.stats().anonymous_subjects, 0);

        controller.log_spawn(&uuid(2), 0, 60, 0);
        let summary = controller.on_match_end().unwrap();

        let events = read_artifact(&summary.path).unwrap().events;
        assert!(events.iter().all(|e| e.kind() != EventKind::WoolTouch));
        assert_eq!(events[1], MatchEvent::spawn(0, 0, BlockPos::new(0, 60, 0)));
    }

    #[test]
    fn test_positions_toggle_gates_sampling() {
        let dir = tempdir().unwrap();
        let (controller, _) = controller(&dir);
        controller.on_match_start("Twin Peaks");
        let subject = [SubjectSnapshot::new(uuid(1), 1.0, 64.0, 1.0)];

        assert!(!controller.toggle(Feature::Positions));
        assert_eq!(controller.sample_all(&subject), 0);
        assert!(controller.toggle(Feature::Positions));
        assert_eq!(controller.sample_all(&subject), 1);
        assert_eq!(controller.sample_all(&subject), 0);
    }

    #[test]
    fn test_second_match_start_closes_previous() {
        let dir = tempdir().unwrap();
        let (controller, _) = controller(&dir);

        controller.on_match_start("Airship Battle");
        let first = controller.active_session().unwrap();
        controller.log_spawn(&uuid(1), 0, 0, 0);

        controller.on_match_start("Twin Peaks");
        assert!(first.is_closed());
        assert!(first.path().exists());
        assert_eq!(
            read_artifact(first.path()).unwrap().events.last().map(|e| e.kind()),
            Some(EventKind::MatchEnd)
        );

        let second = controller.active_session().unwrap();
        assert!(second.path().starts_with(dir.path().join("data").join("twin_peaks")));

        // Anonymous ids restart with the new session
        controller.log_spawn(&uuid(9), 0, 0, 0);
        controller.on_match_end();
        let events = read_artifact(second.path()).unwrap().events;
        assert_eq!(events[1], MatchEvent::spawn(0, 0, BlockPos::new(0, 0, 0)));
    }

    #[test]
    fn test_open_failure_stays_idle() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("data");
        fs::write(&blocker, b"not a directory").unwrap();

        let (controller, _) = controller(&dir);
        assert!(!controller.on_match_start("Airship Battle"));
        assert!(!controller.is_recording());

        controller.log_spawn(&uuid(1), 0, 0, 0);
        assert!(controller.on_match_end().is_none());
    }

    #[test]
    fn test_status() {
        let dir = tempdir().unwrap();
        let (controller, _) = controller(&dir);
        controller.toggle(Feature::Deaths);

        let idle = controller.status();
        assert!(idle.recording.is_none());
        assert!(!idle.features.deaths);
        assert!(idle.to_string().contains("deaths: OFF"));
        assert!(idle.to_string().contains("Not recording"));

        controller.on_match_start("Airship Battle");
        controller.log_spawn(&uuid(1), 0, 0, 0);
        let recording = controller.status().recording.unwrap();
        assert!(recording.file_name.ends_with(".parquet"));
        assert_eq!(recording.map_name.as_deref(), Some("Airship Battle"));
        assert_eq!(recording.stats.events_recorded, 2);
    }

    #[test]
    fn test_closed_sessions_are_catalogued() {
        let dir = tempdir().unwrap();
        let controller = SessionController::new(&config(&dir), Arc::new(Allowlist::empty()))
            .with_catalog(SessionCatalog::in_memory().unwrap());

        controller.on_match_start("Airship Battle");
        controller.on_match_end();
        controller.on_match_start("Twin Peaks");
        controller.on_match_end();

        let catalog = controller.catalog().unwrap();
        assert_eq!(catalog.stats().unwrap().recordings, 2);
        let airship = catalog.list_for_map("airship_battle").unwrap();
        assert_eq!(airship.len(), 1);
        assert_eq!(airship[0].event_count, 2);
    }

    #[test]
    fn test_unfinalised_sessions_are_not_catalogued() {
        let dir = tempdir().unwrap();
        let controller = SessionController::new(&config(&dir), Arc::new(Allowlist::empty()))
            .with_catalog(SessionCatalog::in_memory().unwrap());

        controller.on_match_start("Airship Battle");
        let session = controller.active_session().unwrap();
        let mut partial = session.path().as_os_str().to_os_string();
        partial.push(".partial");
        fs::remove_file(&partial).unwrap();

        assert!(controller.on_match_end().is_none());
        assert!(session.is_closed());
        assert!(!session.path().exists());
        assert_eq!(controller.catalog().unwrap().stats().unwrap().recordings, 0);
    }

    #[test]
    fn test_concurrent_match_boundaries_never_overlap() {
        let dir = tempdir().unwrap();
        let controller = SessionController::new(&config(&dir), Arc::new(Allowlist::empty()))
            .with_catalog(SessionCatalog::in_memory().unwrap());

        std::thread::scope(|s| {
            for t in 0..4u128 {
                let controller = &controller;
                s.spawn(move || {
                    for _ in 0..10 {
                        controller.on_match_start("Airship Battle");
                        controller.log_spawn(&uuid(t), 0, 64, 0);
                        controller.on_match_end();
                    }
                });
            }
        });
        assert!(!controller.is_recording());

        let mut entries = controller.catalog().unwrap().list().unwrap();
        assert!(!entries.is_empty());
        entries.sort_by_key(|e| (e.started_at, e.ended_at));
        for pair in entries.windows(2) {
            assert!(pair[0].ended_at <= pair[1].started_at);
        }

        for entry in &entries {
            let events = read_artifact(&entry.path).unwrap().events;
            assert_eq!(events.first().map(|e| e.kind()), Some(EventKind::MatchStart));
            assert_eq!(events.last().map(|e| e.kind()), Some(EventKind::MatchEnd));
        }

        let leftovers = fs::read_dir(dir.path().join("data").join("airship_battle"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "partial"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_permitted_ids_follow_allowlist_reload() {
        let dir = tempdir().unwrap();
        let cfg = config(&dir);
        fs::write(&cfg.allowlist_path, "permitted: {}\n").unwrap();

        let controller = SessionController::from_config(&cfg).unwrap();
        controller.on_match_start("Airship Battle");
        controller.log_spawn(&uuid(5), 0, 0, 0);

        fs::write(
            &cfg.allowlist_path,
            format!("permitted:\n  \"{}\": 42\n", uuid(5)),
        )
        .unwrap();
        assert_eq!(controller.reload_allowlist().unwrap(), 1);
        controller.log_spawn(&uuid(5), 0, 0, 0);

        let summary = controller.on_match_end().unwrap();
        let events = read_artifact(&summary.path).unwrap().events;
        assert_eq!(events[1], MatchEvent::spawn(0, 0, BlockPos::new(0, 0, 0)));
        assert_eq!(events[2], MatchEvent::spawn(0, 42, BlockPos::new(0, 0, 0)));
    }

    #[test]
    fn test_built_in_sampler_runs_while_recording() {
        struct Still;
        impl ParticipantSource for Still {
            fn participants(&self) -> Vec<SubjectSnapshot> {
                vec![SubjectSnapshot::new(DurableId::from_u128(1), 3.0, 64.0, 3.0)]
            }
        }

        let dir = tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.sample_interval_secs = 1;
        let controller = SessionController::new(&cfg, Arc::new(Allowlist::empty()))
            .with_participants(Arc::new(Still));

        controller.on_match_start("Airship Battle");
        let session = controller.active_session().unwrap();
        std::thread::sleep(Duration::from_millis(1300));
        let summary = controller.on_match_end().unwrap();

        assert!(session.is_closed());
        let events = read_artifact(&summary.path).unwrap().events;
        assert_eq!(events.iter().filter(|e| e.kind() == EventKind::Position).count(), 1);
    }
}
