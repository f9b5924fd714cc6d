use chrono::{DateTime, Utc};

/// Last confirmed playback position and the wall-clock instant it was seen.
///
/// The estimate only counts whole elapsed seconds, matching the integer
/// position media players report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionAnchor {
    /// Anchor position in whole seconds.
    pub position: u64,
    /// Wall-clock instant corresponding to `position`.
    pub anchor: DateTime<Utc>,
}

impl PositionAnchor {
    pub fn new(position: u64, anchor: DateTime<Utc>) -> Self {
        Self { position, anchor }
    }

    /// Whole seconds between the anchor and `now`. A clock that moved
    /// backwards counts as zero.
    pub fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        let secs = (now - self.anchor).num_seconds();
        u64::try_from(secs).unwrap_or(0)
    }

    pub fn estimate(&self, now: DateTime<Utc>) -> u64 {
        self.position.saturating_add(self.elapsed(now))
    }
}

/// Convert a reported position in seconds to whole seconds.
///
/// Non-finite values are treated as "not reported"; negative positions are
/// not meaningful and clamp to zero.
pub fn sanitize_position(p: f64) -> Option<u64> {
    if !p.is_finite() {
        None
    } else if p < 0.0 {
        Some(0)
    } else {
        Some(p.floor() as u64)
    }
}
