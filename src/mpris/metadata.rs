//! Track metadata querying for MPRIS.

use crate::mpris::connection::{MprisError, get_dbus_conn};
use std::collections::HashMap;
use zbus::Proxy;
use zvariant::OwnedValue;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Track length in seconds.
    pub length: Option<f64>,
}

/// Extract metadata fields from a D-Bus property map.
///
/// The MPRIS spec says `xesam:artist` is an array of strings, but some
/// players send a single string, so both shapes are accepted.
pub fn extract_metadata(map: &HashMap<String, OwnedValue>) -> TrackMetadata {
    let title = map
        .get("xesam:title")
        .and_then(|v| TryInto::<String>::try_into(v.clone()).ok());
    let artist = map.get("xesam:artist").and_then(|v| {
        if let Ok(list) = TryInto::<Vec<String>>::try_into(v.clone()) {
            return join_artists(list);
        }
        TryInto::<String>::try_into(v.clone()).ok()
    });
    let length = map.get("mpris:length").and_then(|v| {
        if let Ok(i) = TryInto::<i64>::try_into(v.clone()) {
            return Some(i as f64 / 1_000_000.0);
        }
        if let Ok(u) = TryInto::<u64>::try_into(v.clone()) {
            return Some(u as f64 / 1_000_000.0);
        }
        None
    });
    TrackMetadata {
        title: non_blank(title),
        artist: non_blank(artist),
        length,
    }
}

/// Multiple artists are joined the way NetEase lists them.
fn join_artists(list: Vec<String>) -> Option<String> {
    let artists: Vec<String> = list.into_iter().filter(|a| !a.trim().is_empty()).collect();
    if artists.is_empty() {
        None
    } else {
        Some(artists.join("/"))
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Query metadata for a specific MPRIS player service.
pub async fn get_metadata(service: &str) -> Result<TrackMetadata, MprisError> {
    if service.is_empty() {
        return Ok(TrackMetadata::default());
    }
    let conn = get_dbus_conn().await?;
    // Use targeted Properties.Get to avoid triggering GetAll
    let props_proxy = Proxy::new(
        &conn,
        service,
        "/org/mpris/MediaPlayer2",
        "org.freedesktop.DBus.Properties",
    )
    .await?;
    if let Ok(reply) = props_proxy
        .call_method("Get", &("org.mpris.MediaPlayer2.Player", "Metadata"))
        .await
        && let Ok(val) = reply.body().deserialize::<OwnedValue>()
        && let Ok(map) = TryInto::<HashMap<String, OwnedValue>>::try_into(val)
    {
        return Ok(extract_metadata(&map));
    }
    Ok(TrackMetadata::default())
}
