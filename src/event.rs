use crate::mpris::{PlaybackStatus, PlayerObservation};
use crate::state::Identity;
use crate::tracker::{FetchOutcome, LyricsSource, Tracker};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum Event {
    /// A fresh poll of the monitored player.
    Player(PlayerObservation),
    /// The player could not be reached (closed, or left the bus).
    Gone,
}

/// Route one host event into the tracker.
///
/// Only a playing player keeps lyrics alive: paused, stopped or vanished
/// players reset the tracker to its neutral state.
pub fn process_event<S: LyricsSource>(
    event: Event,
    tracker: &Tracker<S>,
    now: DateTime<Utc>,
) -> Option<JoinHandle<FetchOutcome>> {
    match event {
        Event::Player(obs) if obs.status == PlaybackStatus::Playing => {
            tracker.ingest(obs.update, now)
        }
        Event::Player(_) | Event::Gone => {
            // Already neutral; nothing can be in flight.
            if tracker.snapshot().identity == Identity::default() {
                return None;
            }
            tracing::debug!("Playback stopped, resetting lyrics");
            tracker.reset(now);
            None
        }
    }
}
