mod event;
mod lyrics;
mod mpris;
mod pool;
mod state;
mod timer;
mod tracker;
mod ui;

use crate::lyrics::NeteaseClient;
use crate::pool::PoolSettings;
use crate::state::{LinePairing, PlayerUpdate};
use crate::tracker::{Tracker, TrackerConfig};
use chrono::Utc;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::error::Error;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Base URL of the NetEase Cloud Music API deployment
    #[arg(long, env = "NETEASE_API_BASE", global = true)]
    api_base: Option<String>,
    /// Enable backend debug logging to stderr (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug_log: bool,
    /// Give up on a lyrics search after this many seconds
    #[arg(long, value_name = "SECS", global = true)]
    fetch_timeout_secs: Option<u64>,
    /// How the current line is shown
    #[arg(long, value_enum, default_value_t = LinePairing::PreviousAndCurrent, global = true)]
    pairing: LinePairing,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Follow media players and print the current lyric line (default)
    Watch(WatchArgs),
    /// Look up lyrics for one song and print the result as JSON
    Search {
        #[arg(long)]
        artist: String,
        #[arg(long)]
        title: String,
        /// Playback position in seconds used for the current line
        #[arg(long, default_value_t = 0)]
        position: u64,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct WatchArgs {
    /// MPRIS players to monitor (comma-separated); all players when empty
    #[arg(long = "player", value_name = "PLAYER1,PLAYER2", value_delimiter = ',')]
    players: Vec<String>,
    /// Blocklist for MPRIS player service names (comma-separated, case-insensitive)
    #[arg(long = "block", value_name = "SERVICE1,SERVICE2", value_delimiter = ',')]
    block: Vec<String>,
    /// Milliseconds between player polls
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
    /// Print each update as a JSON object
    #[arg(long)]
    json: bool,
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            block: Vec::new(),
            poll_interval_ms: 1000,
            json: false,
        }
    }
}

impl Config {
    /// The API base URL, rejecting a missing or blank value the way clap
    /// rejects any other missing argument.
    fn api_base(&self) -> Result<String, clap::Error> {
        self.api_base
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| {
                Config::command().error(
                    ErrorKind::MissingRequiredArgument,
                    "--api-base <API_BASE> (or NETEASE_API_BASE) is required",
                )
            })
    }

    fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            pairing: self.pairing,
            fetch_timeout: self.fetch_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn init_tracing(debug_log: bool) {
    let default_level = if debug_log { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_search(
    cfg: &Config,
    client: NeteaseClient,
    artist: String,
    title: String,
    position: u64,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let tracker = Tracker::new(client, cfg.tracker_config(), Utc::now());
    let update = PlayerUpdate {
        artist: Some(artist),
        title: Some(title),
        position: Some(position),
        duration: None,
    };
    if let Some(handle) = tracker.ingest(update, Utc::now()) {
        handle.await?;
    }
    println!("{}", serde_json::to_string_pretty(&tracker.view(Utc::now()))?);
    Ok(())
}

async fn run_watch(
    cfg: &Config,
    client: NeteaseClient,
    args: WatchArgs,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let settings = PoolSettings {
        poll_interval: Duration::from_millis(args.poll_interval_ms.max(50)),
        tracker: cfg.tracker_config(),
        block: args.block,
    };
    let (update_tx, update_rx) = mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });
    tokio::spawn(pool::supervise(
        args.players,
        client,
        settings,
        update_tx,
        shutdown_rx,
    ));

    ui::display_lyrics_pipe(update_rx, args.json).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cfg = Config::parse();
    init_tracing(cfg.debug_log);

    let api_base = cfg.api_base().unwrap_or_else(|e| e.exit());
    let client = NeteaseClient::new(api_base);
    tracing::debug!(api_base = client.base_url(), "Using lyrics API");

    let result = match cfg.command.clone() {
        Some(Command::Search {
            artist,
            title,
            position,
        }) => run_search(&cfg, client, artist, title, position).await,
        Some(Command::Watch(args)) => run_watch(&cfg, client, args).await,
        None => run_watch(&cfg, client, WatchArgs::default()).await,
    };

    // Print error if any, for better diagnostics
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }
    Ok(())
}
