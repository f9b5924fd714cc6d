//! Per-source lyrics tracker.
//!
//! The tracker publishes immutable [`PlaybackState`] snapshots through a
//! `tokio::sync::watch` channel. Every mutation builds a new snapshot from
//! the current one and swaps it in whole, so readers (a poller rendering the
//! current line, a subscriber printing updates) always see a consistent
//! state. Lyrics fetches run as independent tasks and are applied through
//! the same swap once they finish; a result for a track that is no longer
//! current is dropped.

use crate::lyrics::LyricsError;
use crate::state::{FetchRequest, LinePairing, LyricsView, PlaybackState, PlayerUpdate};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Something that can turn an (artist, title) pair into tagged lyrics text.
pub trait LyricsSource: Send + Sync + 'static {
    fn fetch(
        &self,
        artist: &str,
        title: &str,
    ) -> impl Future<Output = Result<String, LyricsError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The track changed (or playback was reset) while the fetch ran.
    Discarded,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerConfig {
    pub pairing: LinePairing,
    /// Deadline for one lyrics fetch; `None` waits as long as the source does.
    pub fetch_timeout: Option<Duration>,
}

pub struct Tracker<S> {
    state: Arc<watch::Sender<Arc<PlaybackState>>>,
    source: Arc<S>,
    config: TrackerConfig,
}

impl<S> Clone for Tracker<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            source: Arc::clone(&self.source),
            config: self.config,
        }
    }
}

impl<S: LyricsSource> Tracker<S> {
    pub fn new(source: S, config: TrackerConfig, now: DateTime<Utc>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(PlaybackState::new(now)));
        Self {
            state: Arc::new(tx),
            source: Arc::new(source),
            config,
        }
    }

    /// Feed one player observation. Returns the spawned fetch task when the
    /// observation switched to a new, searchable track.
    pub fn ingest(&self, update: PlayerUpdate, now: DateTime<Utc>) -> Option<JoinHandle<FetchOutcome>> {
        let mut fetch = None;
        self.state.send_if_modified(|current| {
            let transition = current.ingest(update, now);
            fetch = transition.fetch;
            match transition.state {
                Some(next) => {
                    *current = Arc::new(next);
                    true
                }
                None => false,
            }
        });
        fetch.map(|request| self.spawn_fetch(request))
    }

    pub fn reset(&self, now: DateTime<Utc>) {
        self.state.send_modify(|current| {
            *current = Arc::new(current.reset(now));
        });
    }

    pub fn snapshot(&self) -> Arc<PlaybackState> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PlaybackState>> {
        self.state.subscribe()
    }

    pub fn current_line(&self, now: DateTime<Utc>) -> String {
        self.snapshot().current_line(now, self.config.pairing)
    }

    pub fn view(&self, now: DateTime<Utc>) -> LyricsView {
        self.snapshot().view(now, self.config.pairing)
    }

    fn spawn_fetch(&self, request: FetchRequest) -> JoinHandle<FetchOutcome> {
        let state = Arc::clone(&self.state);
        let source = Arc::clone(&self.source);
        let deadline = self.config.fetch_timeout;
        tokio::spawn(async move {
            let fetch = source.fetch(&request.artist, &request.title);
            let result = match deadline {
                Some(limit) => tokio::time::timeout(limit, fetch)
                    .await
                    .unwrap_or_else(|_| Err(LyricsError::Timeout(limit))),
                None => fetch.await,
            };
            apply_fetch(&state, &request, result)
        })
    }
}

fn apply_fetch(
    state: &watch::Sender<Arc<PlaybackState>>,
    request: &FetchRequest,
    result: Result<String, LyricsError>,
) -> FetchOutcome {
    let mut outcome = FetchOutcome::Discarded;
    state.send_if_modified(|current| match current.apply_fetch(request, result) {
        Some(next) => {
            *current = Arc::new(next);
            outcome = FetchOutcome::Applied;
            true
        }
        None => false,
    });
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::{Sentinel, UNAVAILABLE_LINE};
    use chrono::{TimeDelta, TimeZone};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// In-memory source keyed by title. Titles with a gate block until the
    /// gate is notified.
    #[derive(Default)]
    struct FakeSource {
        lyrics: HashMap<String, String>,
        gates: Mutex<HashMap<String, Arc<Notify>>>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with(mut self, title: &str, lyrics: &str) -> Self {
            self.lyrics.insert(title.to_string(), lyrics.to_string());
            self
        }

        fn gate(&self, title: &str) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            self.gates
                .lock()
                .unwrap()
                .insert(title.to_string(), Arc::clone(&notify));
            notify
        }
    }

    impl LyricsSource for FakeSource {
        async fn fetch(&self, _artist: &str, title: &str) -> Result<String, LyricsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().unwrap().get(title).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.lyrics
                .get(title)
                .cloned()
                .ok_or(LyricsError::SongNotFound)
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn update(artist: &str, title: &str, position: u64, duration: u64) -> PlayerUpdate {
        PlayerUpdate {
            artist: Some(artist.to_string()),
            title: Some(title.to_string()),
            position: Some(position),
            duration: Some(duration),
        }
    }

    #[tokio::test]
    async fn fetched_lyrics_drive_current_line() {
        let source = FakeSource::default().with("B", "[00:01.00]Hello[00:05.00]World");
        let tracker = Tracker::new(source, TrackerConfig::default(), t0());

        let handle = tracker.ingest(update("A", "B", 3, 200), t0()).unwrap();
        assert_eq!(handle.await.unwrap(), FetchOutcome::Applied);

        assert_eq!(tracker.current_line(t0()), "HelloWorld");
        let view = tracker.view(t0() + TimeDelta::seconds(2));
        assert_eq!(view.current_line, "HelloWorld");
        let past_end = tracker.view(t0() + TimeDelta::seconds(3));
        assert_eq!(past_end.current_line, UNAVAILABLE_LINE);
        assert_eq!(view.lyrics, "[00:01.00]Hello[00:05.00]World");
    }

    #[tokio::test]
    async fn searching_placeholder_until_fetch_completes() {
        let source = FakeSource::default().with("B", "[00:01.00]Hello");
        let gate = source.gate("B");
        let tracker = Tracker::new(source, TrackerConfig::default(), t0());

        let handle = tracker.ingest(update("A", "B", 3, 200), t0()).unwrap();
        assert_eq!(tracker.current_line(t0()), Sentinel::Searching.message());

        gate.notify_one();
        assert_eq!(handle.await.unwrap(), FetchOutcome::Applied);
        assert_eq!(tracker.current_line(t0()), "Hello");
    }

    #[tokio::test]
    async fn repeated_updates_do_not_refetch_or_reanchor() {
        let source = FakeSource::default().with("B", "[00:01.00]Hello");
        let tracker = Tracker::new(source, TrackerConfig::default(), t0());

        tracker
            .ingest(update("A", "B", 10, 200), t0())
            .unwrap()
            .await
            .unwrap();
        let t1 = t0() + TimeDelta::seconds(4);
        assert!(tracker.ingest(update("A", "B", 10, 200), t1).is_none());
        assert_eq!(tracker.snapshot().timer.anchor, t0());
        assert_eq!(tracker.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_fetch_never_overwrites_newer_track() {
        let source = FakeSource::default()
            .with("B", "[00:01.00]old track")
            .with("D", "[00:01.00]new track");
        let gate = source.gate("B");
        let tracker = Tracker::new(source, TrackerConfig::default(), t0());

        let slow = tracker.ingest(update("A", "B", 10, 200), t0()).unwrap();
        let t1 = t0() + TimeDelta::seconds(1);
        let fast = tracker.ingest(update("C", "D", 0, 180), t1).unwrap();
        assert_eq!(fast.await.unwrap(), FetchOutcome::Applied);

        gate.notify_one();
        assert_eq!(slow.await.unwrap(), FetchOutcome::Discarded);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.identity.title.as_deref(), Some("D"));
        assert_eq!(snapshot.timer.position, 0);
        assert_eq!(snapshot.timer.anchor, t1);
        assert_eq!(tracker.current_line(t1 + TimeDelta::seconds(1)), "new track");
    }

    #[tokio::test]
    async fn reset_discards_outstanding_fetch() {
        let source = FakeSource::default().with("B", "[00:01.00]Hello");
        let gate = source.gate("B");
        let tracker = Tracker::new(source, TrackerConfig::default(), t0());

        let handle = tracker.ingest(update("A", "B", 10, 200), t0()).unwrap();
        tracker.reset(t0());
        gate.notify_one();
        assert_eq!(handle.await.unwrap(), FetchOutcome::Discarded);

        let snapshot = tracker.snapshot();
        assert!(snapshot.identity.artist.is_none());
        assert_eq!(snapshot.lyrics, Sentinel::Reset.document());
    }

    #[tokio::test]
    async fn fetch_deadline_installs_unavailable_sentinel() {
        let source = FakeSource::default().with("B", "[00:01.00]Hello");
        let _gate = source.gate("B");
        let config = TrackerConfig {
            fetch_timeout: Some(Duration::from_millis(20)),
            ..TrackerConfig::default()
        };
        let tracker = Tracker::new(source, config, t0());

        let handle = tracker.ingest(update("A", "B", 10, 200), t0()).unwrap();
        assert_eq!(handle.await.unwrap(), FetchOutcome::Applied);
        assert_eq!(tracker.snapshot().lyrics, Sentinel::Unavailable.document());
        assert_eq!(tracker.current_line(t0()), UNAVAILABLE_LINE);
    }

    #[tokio::test]
    async fn missing_song_installs_not_found_sentinel() {
        let tracker = Tracker::new(FakeSource::default(), TrackerConfig::default(), t0());
        let handle = tracker.ingest(update("A", "Nope", 0, 200), t0()).unwrap();
        assert_eq!(handle.await.unwrap(), FetchOutcome::Applied);
        assert_eq!(tracker.current_line(t0()), Sentinel::SongNotFound.message());
    }

    #[tokio::test]
    async fn subscribers_see_published_snapshots() {
        let source = FakeSource::default().with("B", "[00:01.00]Hello");
        let config = TrackerConfig {
            pairing: LinePairing::Current,
            ..TrackerConfig::default()
        };
        let tracker = Tracker::new(source, config, t0());
        let mut rx = tracker.subscribe();

        let handle = tracker.ingest(update("A", "B", 2, 200), t0()).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().identity.title.as_deref(), Some("B"));

        handle.await.unwrap();
        assert_eq!(tracker.current_line(t0()), "Hello");
    }
}
