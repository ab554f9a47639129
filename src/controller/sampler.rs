// src/controller/sampler.rs
//! Periodic position sampler
//!
//! A background thread that asks the host for the current participants on a
//! fixed tick and feeds them to the active session.

use crate::controller::features::{Feature, FeatureToggles};
use crate::recording::session::RecordingSession;
use crate::recording::subject::SubjectSnapshot;
use crate::utils::errors::{Result, TelemetryError};
use crossbeam_channel::{bounded, select, tick, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Supplies the participants eligible for position sampling
pub trait ParticipantSource: Send + Sync {
    /// Active participants only (spectators and observers filtered out)
    fn participants(&self) -> Vec<SubjectSnapshot>;
}

/// Handle to a running sampler thread
pub struct Sampler {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Sampler {
    /// Start sampling `session` every `interval`. The first sample is taken
    /// one interval after start.
    pub fn spawn(
        interval: Duration,
        session: Arc<RecordingSession>,
        source: Arc<dyn ParticipantSource>,
        toggles: Arc<FeatureToggles>,
    ) -> Result<Self> {
        let (stop, stopped) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name("ctw-sampler".to_string())
            .spawn(move || {
                loop {
                    select! {
                        recv(stopped) -> _ => break,
                        recv(ticker) -> _ => {
                            if toggles.is_enabled(Feature::Positions) {
                                let participants = source.participants();
                                session.sample(&participants);
                            }
                        }
                    }
                }
                debug!("Sampler for session {} stopped", session.id());
            })
            .map_err(|e| {
                TelemetryError::Configuration(format!("Failed to start sampler thread: {}", e))
            })?;

        info!("Started position sampling every {:?}", interval);
        Ok(Self { stop, handle })
    }

    /// Stop the thread and wait for an in-progress sample to finish
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("Sampler thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Allowlist, DurableId};
    use crate::recording::artifact::{read_artifact, ArtifactOptions};
    use crate::recording::clock::SystemClock;
    use crate::recording::event::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Walker {
        calls: AtomicUsize,
    }

    impl ParticipantSource for Walker {
        fn participants(&self) -> Vec<SubjectSnapshot> {
            let step = self.calls.fetch_add(1, Ordering::SeqCst) as f64;
            vec![SubjectSnapshot::new(DurableId::from_u128(1), step, 64.0, 0.0)]
        }
    }

    fn session(dir: &std::path::Path) -> Arc<RecordingSession> {
        Arc::new(
            RecordingSession::open(
                &dir.join("m.parquet"),
                None,
                Arc::new(Allowlist::empty()),
                Arc::new(SystemClock::new()),
                ArtifactOptions::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_sampler_records_positions() {
        let dir = tempdir().unwrap();
        let session = session(dir.path());
        let source = Arc::new(Walker {
            calls: AtomicUsize::new(0),
        });

        let sampler = Sampler::spawn(
            Duration::from_millis(10),
            Arc::clone(&session),
            source.clone(),
            Arc::new(FeatureToggles::default()),
        )
        .unwrap();

        while source.calls.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(5));
        }
        sampler.stop();
        session.close();

        let events = read_artifact(&dir.path().join("m.parquet")).unwrap().events;
        let positions = events.iter().filter(|e| e.kind() == EventKind::Position).count();
        assert_eq!(positions, source.calls.load(Ordering::SeqCst));
    }

    #[test]
    fn test_sampler_respects_positions_toggle() {
        let dir = tempdir().unwrap();
        let session = session(dir.path());
        let toggles = Arc::new(FeatureToggles::default());
        toggles.set_enabled(Feature::Positions, false);

        let source = Arc::new(Walker {
            calls: AtomicUsize::new(0),
        });
        let sampler = Sampler::spawn(
            Duration::from_millis(5),
            Arc::clone(&session),
            source.clone(),
            toggles,
        )
        .unwrap();

        thread::sleep(Duration::from_millis(40));
        sampler.stop();

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.stats().events_recorded, 1);
    }
}
