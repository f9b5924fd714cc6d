// pool.rs: One polling loop per monitored player, plus discovery

use crate::event::{Event, process_event};
use crate::mpris;
use crate::state::LyricsView;
use crate::tracker::{LyricsSource, Tracker, TrackerConfig};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;

const DISCOVERY_INTERVAL: Duration = Duration::from_secs(5);

/// Current lyrics of one player, sent whenever the displayed line changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUpdate {
    pub player: String,
    pub view: LyricsView,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub poll_interval: Duration,
    pub tracker: TrackerConfig,
    /// Case-insensitive substrings of service names to ignore.
    pub block: Vec<String>,
}

/// Whether `view` differs from what was last shown for the player.
fn should_emit(last: Option<&LyricsView>, view: &LyricsView) -> bool {
    match last {
        None => true,
        Some(last) => {
            last.current_line != view.current_line
                || last.artist != view.artist
                || last.title != view.title
                || last.active != view.active
        }
    }
}

/// Poll `service` until shutdown, feeding its state into `tracker`.
///
/// With `exit_when_gone` the loop ends once the player stops answering, so
/// discovery can pick it up again later.
pub async fn listen<S: LyricsSource>(
    service: String,
    tracker: Tracker<S>,
    poll_interval: Duration,
    exit_when_gone: bool,
    update_tx: mpsc::Sender<SourceUpdate>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let player = mpris::short_name(&service).to_string();
    let mut last: Option<LyricsView> = None;
    let mut state_rx = tracker.subscribe();
    tracing::info!(player = %player, "Monitoring player");

    loop {
        let event = match mpris::observe(&service).await {
            Ok(obs) => Event::Player(obs),
            Err(e) => {
                tracing::debug!(player = %player, error = %e, "Player not reachable");
                Event::Gone
            }
        };
        let gone = matches!(event, Event::Gone);
        // Fetch tasks run detached and wake the loop through `state_rx`.
        let _ = process_event(event, &tracker, Utc::now());
        let _ = state_rx.borrow_and_update();

        let view = tracker.view(Utc::now());
        if should_emit(last.as_ref(), &view) {
            let update = SourceUpdate {
                player: player.clone(),
                view: view.clone(),
            };
            if update_tx.send(update).await.is_err() {
                break;
            }
            last = Some(view);
        }

        if gone && exit_when_gone {
            tracing::info!(player = %player, "Player went away");
            break;
        }

        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = state_rx.changed() => {}
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

/// Run listeners for the given players, or for every discovered player when
/// `players` is empty, until shutdown is signalled.
///
/// Each player gets its own tracker; they only share the stateless source.
pub async fn supervise<S: LyricsSource + Clone>(
    players: Vec<String>,
    source: S,
    settings: PoolSettings,
    update_tx: mpsc::Sender<SourceUpdate>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let discover = players.is_empty();
    let fixed: Vec<String> = players.iter().map(|p| mpris::service_name(p)).collect();
    let mut running: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        running.retain(|_, handle| !handle.is_finished());

        let services = if discover {
            match mpris::get_active_player_names().await {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to list MPRIS players");
                    Vec::new()
                }
            }
        } else {
            fixed.clone()
        };

        for service in services {
            if running.contains_key(&service) || mpris::is_blocked(&service, &settings.block) {
                continue;
            }
            let tracker = Tracker::new(source.clone(), settings.tracker, Utc::now());
            let handle = tokio::spawn(listen(
                service.clone(),
                tracker,
                settings.poll_interval,
                discover,
                update_tx.clone(),
                shutdown_rx.clone(),
            ));
            running.insert(service, handle);
        }

        if !discover {
            break;
        }
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(DISCOVERY_INTERVAL) => {}
        }
    }

    for (_, handle) in running {
        let _ = handle.await;
    }
}
