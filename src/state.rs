// state.rs: Immutable playback snapshots and their update rules

use crate::lyrics::{LyricsDocument, LyricsError, Sentinel, UNAVAILABLE_LINE, parse};
use crate::timer::PositionAnchor;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The (artist, title) pair a lyrics document belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl Identity {
    /// Build an identity, treating blank strings as unset.
    pub fn new(artist: Option<String>, title: Option<String>) -> Self {
        let clean = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Self {
            artist: clean(artist),
            title: clean(title),
        }
    }

    /// Both artist and title are known, so lyrics can be searched for.
    pub fn is_complete(&self) -> bool {
        self.artist.is_some() && self.title.is_some()
    }
}

/// One observation of the media player, as supplied by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    pub artist: Option<String>,
    pub title: Option<String>,
    /// Whole seconds; `None` means the player did not report a position.
    pub position: Option<u64>,
    pub duration: Option<u64>,
}

/// How the current lyric line is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LinePairing {
    /// The line before the position joined with the one it runs up to.
    #[default]
    PreviousAndCurrent,
    /// Only the line that has most recently started.
    Current,
}

/// Lyrics requested for an identity that was current at `generation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub artist: String,
    pub title: String,
    pub generation: u64,
}

/// Result of feeding a `PlayerUpdate` into a snapshot.
#[derive(Debug, Default)]
pub struct Transition {
    /// The next snapshot, or `None` when nothing changed.
    pub state: Option<PlaybackState>,
    pub fetch: Option<FetchRequest>,
}

/// Snapshot of everything known about one media source.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub identity: Identity,
    pub timer: PositionAnchor,
    pub duration: u64,
    pub lyrics: LyricsDocument,
    /// Bumped on every identity change and reset; fetch results carry the
    /// generation they were requested for.
    pub generation: u64,
}

/// Value object handed to the host for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricsView {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub position: u64,
    pub duration: u64,
    pub state_time: DateTime<Utc>,
    pub current_line: String,
    pub lyrics: String,
    pub active: bool,
}

impl PlaybackState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            identity: Identity::default(),
            timer: PositionAnchor::new(0, now),
            duration: 0,
            lyrics: Sentinel::Reset.document(),
            generation: 0,
        }
    }

    pub fn ingest(&self, update: PlayerUpdate, now: DateTime<Utc>) -> Transition {
        let identity = Identity::new(update.artist, update.title);

        if identity != self.identity {
            let generation = self.generation + 1;
            let fetch = match (&identity.artist, &identity.title) {
                (Some(artist), Some(title)) => Some(FetchRequest {
                    artist: artist.clone(),
                    title: title.clone(),
                    generation,
                }),
                _ => None,
            };
            let lyrics = if fetch.is_some() {
                Sentinel::Searching.document()
            } else {
                Sentinel::Reset.document()
            };
            tracing::debug!(
                artist = ?identity.artist,
                title = ?identity.title,
                generation,
                "Track changed"
            );
            let state = PlaybackState {
                identity,
                timer: PositionAnchor::new(update.position.unwrap_or(0), now),
                duration: update.duration.unwrap_or(0),
                lyrics,
                generation,
            };
            return Transition {
                state: Some(state),
                fetch,
            };
        }

        let mut next = self.clone();
        let mut changed = false;
        if let Some(duration) = update.duration
            && duration != next.duration
        {
            next.duration = duration;
            changed = true;
        }
        // Re-anchoring on an unchanged position would reset the elapsed
        // clock and make the estimate drift backwards.
        if let Some(position) = update.position
            && position != next.timer.position
        {
            next.timer = PositionAnchor::new(position, now);
            changed = true;
        }

        Transition {
            state: changed.then_some(next),
            fetch: None,
        }
    }

    /// Neutral "no track" state used when playback stops.
    pub fn reset(&self, now: DateTime<Utc>) -> Self {
        Self {
            generation: self.generation + 1,
            ..Self::new(now)
        }
    }

    /// Install the outcome of `request`, or `None` if the snapshot has moved
    /// on to another track since the request was made.
    pub fn apply_fetch(
        &self,
        request: &FetchRequest,
        result: Result<String, LyricsError>,
    ) -> Option<PlaybackState> {
        let same_track = self.generation == request.generation
            && self.identity.artist.as_deref() == Some(request.artist.as_str())
            && self.identity.title.as_deref() == Some(request.title.as_str());
        if !same_track {
            tracing::debug!(
                artist = %request.artist,
                title = %request.title,
                requested = request.generation,
                current = self.generation,
                "Dropping lyrics for a track that is no longer playing"
            );
            return None;
        }

        let lyrics = match result.and_then(|raw| parse(&raw)) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    artist = %request.artist,
                    title = %request.title,
                    error = %e,
                    "Lyrics unavailable"
                );
                e.sentinel().document()
            }
        };
        Some(PlaybackState {
            lyrics,
            ..self.clone()
        })
    }

    pub fn estimated_position(&self, now: DateTime<Utc>) -> u64 {
        self.timer.estimate(now)
    }

    /// Lyric text for the estimated playback position at `now`.
    pub fn current_line(&self, now: DateTime<Utc>, pairing: LinePairing) -> String {
        let position = self.estimated_position(now) as f64;
        let lines = &self.lyrics.lines;
        let line = match pairing {
            LinePairing::PreviousAndCurrent => self
                .lyrics
                .span_end_at(position)
                .map(|j| format!("{}{}", lines[j - 1].text, lines[j].text)),
            LinePairing::Current => self.lyrics.index_at(position).map(|i| lines[i].text.clone()),
        };
        line.unwrap_or_else(|| UNAVAILABLE_LINE.to_string())
    }

    pub fn view(&self, now: DateTime<Utc>, pairing: LinePairing) -> LyricsView {
        LyricsView {
            artist: self.identity.artist.clone(),
            title: self.identity.title.clone(),
            position: self.timer.position,
            duration: self.duration,
            state_time: self.timer.anchor,
            current_line: self.current_line(now, pairing),
            lyrics: self.lyrics.raw.clone(),
            active: self.identity.is_complete(),
        }
    }
}
