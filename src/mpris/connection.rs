//! D-Bus connection management and player discovery for MPRIS.

use std::sync::Arc;
use tokio::sync::OnceCell;
use zbus::proxy;

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

/// Errors that can occur during MPRIS operations
#[derive(thiserror::Error, Debug)]
pub enum MprisError {
    #[error("D-Bus error: {0}")]
    ZBus(#[from] zbus::Error),
    #[error("D-Bus call failed: {0}")]
    Fdo(#[from] zbus::fdo::Error),
    #[error("Failed to establish D-Bus connection")]
    NoConnection,
}

/// Global D-Bus connection singleton
static DBUS_CONNECTION: OnceCell<Arc<zbus::Connection>> = OnceCell::const_new();

/// Get or create a shared D-Bus session connection
pub async fn get_dbus_conn() -> Result<Arc<zbus::Connection>, MprisError> {
    DBUS_CONNECTION
        .get_or_try_init(|| async {
            let conn = zbus::Connection::session()
                .await
                .map_err(|_| MprisError::NoConnection)?;
            Ok(Arc::new(conn))
        })
        .await
        .cloned()
}

/// Proxy interface for playerctld to get active MPRIS players
#[proxy(
    interface = "com.github.altdesktop.playerctld",
    default_service = "org.mpris.MediaPlayer2.playerctld",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait Playerctld {
    #[zbus(property)]
    fn player_names(&self) -> zbus::Result<Vec<String>>;
}

/// Get list of active MPRIS player service names.
///
/// Asks playerctld first; without it, every `org.mpris.MediaPlayer2.*` name
/// on the session bus counts as a player. playerctld itself is never
/// reported as a player.
pub async fn get_active_player_names() -> Result<Vec<String>, MprisError> {
    let conn = get_dbus_conn().await?;

    if let Ok(proxy) = PlayerctldProxy::new(&conn).await
        && let Ok(names) = proxy.player_names().await
        && !names.is_empty()
    {
        return Ok(names);
    }

    let bus = zbus::fdo::DBusProxy::new(&conn).await?;
    let names = bus
        .list_names()
        .await?
        .into_iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    Ok(filter_players(names))
}

fn filter_players(names: Vec<String>) -> Vec<String> {
    let mut players: Vec<String> = names
        .into_iter()
        .filter(|n| n.starts_with(MPRIS_PREFIX) && !n.ends_with(".playerctld"))
        .collect();
    players.sort();
    players
}

/// Accept either a full bus name or the short player name (`spotify`).
pub fn service_name(player: &str) -> String {
    if player.starts_with(MPRIS_PREFIX) {
        player.to_string()
    } else {
        format!("{}{}", MPRIS_PREFIX, player)
    }
}

/// Short display name for a service (`org.mpris.MediaPlayer2.spotify` -> `spotify`).
pub fn short_name(service: &str) -> &str {
    service.strip_prefix(MPRIS_PREFIX).unwrap_or(service)
}

/// Check if a player service name should be blocked
///
/// Returns true if the service name (case-insensitive) contains any blocked string.
pub fn is_blocked(service: &str, block_list: &[String]) -> bool {
    let service_lower = service.to_lowercase();
    block_list
        .iter()
        .any(|blocked| service_lower.contains(&blocked.to_lowercase()))
}
