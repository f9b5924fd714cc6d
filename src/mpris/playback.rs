//! Minimal playback status and position querying for MPRIS.

use crate::mpris::connection::{MprisError, get_dbus_conn};
use zbus::Proxy;
use zvariant::OwnedValue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackStatus {
    pub fn from_mpris(status: &str) -> Self {
        match status {
            "Playing" => PlaybackStatus::Playing,
            "Paused" => PlaybackStatus::Paused,
            _ => PlaybackStatus::Stopped,
        }
    }
}

fn parse_position_from_owned(val: &OwnedValue) -> Option<f64> {
    // Try direct integer types
    if let Ok(i) = TryInto::<i64>::try_into(val.clone()) {
        return Some(i as f64 / 1_000_000.0);
    }
    if let Ok(u) = TryInto::<u64>::try_into(val.clone()) {
        return Some(u as f64 / 1_000_000.0);
    }

    // Try tuple forms like (i64,) or (u64,)
    if let Ok((i,)) = TryInto::<(i64,)>::try_into(val.clone()) {
        return Some(i as f64 / 1_000_000.0);
    }
    if let Ok((u,)) = TryInto::<(u64,)>::try_into(val.clone()) {
        return Some(u as f64 / 1_000_000.0);
    }

    None
}

async fn get_player_property(service: &str, name: &str) -> Result<Option<OwnedValue>, MprisError> {
    let conn = get_dbus_conn().await?;
    // Use targeted Properties.Get to avoid triggering GetAll on some players
    let props_proxy = Proxy::new(
        &conn,
        service,
        "/org/mpris/MediaPlayer2",
        "org.freedesktop.DBus.Properties",
    )
    .await?;
    let reply = props_proxy
        .call_method("Get", &("org.mpris.MediaPlayer2.Player", name))
        .await?;
    Ok(reply.body().deserialize::<OwnedValue>().ok())
}

/// Query the playback position (seconds) for a specific MPRIS player service.
///
/// `None` when the player does not expose a position; plenty of players
/// answer `Get("Position")` with an error.
pub async fn get_position(service: &str) -> Result<Option<f64>, MprisError> {
    if service.is_empty() {
        return Ok(None);
    }
    let value = match get_player_property(service, "Position").await {
        Ok(value) => value,
        Err(MprisError::NoConnection) => return Err(MprisError::NoConnection),
        Err(_) => None,
    };
    Ok(value.as_ref().and_then(parse_position_from_owned))
}

/// Query the playback status for a specific MPRIS player service.
///
/// Fails when the service is not on the bus any more.
pub async fn get_playback_status(service: &str) -> Result<PlaybackStatus, MprisError> {
    if service.is_empty() {
        return Ok(PlaybackStatus::Stopped);
    }
    let status = get_player_property(service, "PlaybackStatus")
        .await?
        .and_then(|val| TryInto::<String>::try_into(val).ok())
        .map(|s| PlaybackStatus::from_mpris(&s))
        .unwrap_or_default();
    Ok(status)
}
