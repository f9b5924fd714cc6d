//! MPRIS module: the media player side of the tracker.

pub mod connection;
pub mod metadata;
pub mod playback;

pub use connection::{MprisError, get_active_player_names, is_blocked, service_name, short_name};
pub use metadata::TrackMetadata;
pub use playback::PlaybackStatus;

use crate::state::PlayerUpdate;
use crate::timer::sanitize_position;

/// One poll of a player: its status and what it reports about the track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerObservation {
    pub status: PlaybackStatus,
    pub update: PlayerUpdate,
}

impl PlayerObservation {
    pub fn new(status: PlaybackStatus, meta: TrackMetadata, position: Option<f64>) -> Self {
        Self {
            status,
            update: PlayerUpdate {
                artist: meta.artist,
                title: meta.title,
                position: position.and_then(sanitize_position),
                duration: meta.length.and_then(sanitize_position),
            },
        }
    }
}

/// Read status, metadata and position of `service`.
pub async fn observe(service: &str) -> Result<PlayerObservation, MprisError> {
    let status = playback::get_playback_status(service).await?;
    let meta = metadata::get_metadata(service).await?;
    let position = playback::get_position(service).await?;
    Ok(PlayerObservation::new(status, meta, position))
}
