use serde::Deserialize;

use crate::lyrics::types::{LyricsError, http_client};
use crate::tracker::LyricsSource;

#[derive(Deserialize)]
struct SearchResponse {
    code: Option<i64>,
    result: Option<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    songs: Vec<Song>,
}

#[derive(Deserialize)]
struct Song {
    id: u64,
}

#[derive(Deserialize)]
struct LyricResponse {
    code: Option<i64>,
    lrc: Option<Lrc>,
}

#[derive(Deserialize)]
struct Lrc {
    lyric: Option<String>,
}

/// Client for a NetEase Cloud Music API deployment.
///
/// Lyrics are looked up in two steps: a keyword search picks the first
/// matching song, then the song's tagged lyrics are requested by id.
#[derive(Debug, Clone)]
pub struct NeteaseClient {
    base_url: String,
}

impl NeteaseClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search for the song and return its raw tagged lyrics.
    pub async fn fetch_lyrics(&self, artist: &str, title: &str) -> Result<String, LyricsError> {
        tracing::info!(artist, title, "Searching lyrics");
        let id = self.search_song(artist, title).await?;
        tracing::debug!(id, "Found song");
        self.lyric_text(id).await
    }

    async fn search_song(&self, artist: &str, title: &str) -> Result<u64, LyricsError> {
        let resp = http_client()
            .get(build_search_url(&self.base_url, artist, title))
            .send()
            .await?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "Search request failed");
            return Err(LyricsError::SongNotFound);
        }
        let body: SearchResponse = serde_json::from_slice(&resp.bytes().await?)?;
        check_code("search", body.code)?;
        first_song_id(body).ok_or(LyricsError::SongNotFound)
    }

    async fn lyric_text(&self, id: u64) -> Result<String, LyricsError> {
        let resp = http_client()
            .get(build_lyric_url(&self.base_url, id))
            .send()
            .await?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), id, "Lyric request failed");
            return Err(LyricsError::LyricsNotFound);
        }
        let body: LyricResponse = serde_json::from_slice(&resp.bytes().await?)?;
        check_code("lyric", body.code)?;
        lyric_from_response(body).ok_or(LyricsError::LyricsNotFound)
    }
}

impl LyricsSource for NeteaseClient {
    async fn fetch(&self, artist: &str, title: &str) -> Result<String, LyricsError> {
        self.fetch_lyrics(artist, title).await
    }
}

fn build_search_url(base: &str, artist: &str, title: &str) -> String {
    let keywords = format!("{} {}", title, artist);
    format!(
        "{}/search?limit=3&keywords={}",
        base,
        urlencoding::encode(&keywords)
    )
}

fn build_lyric_url(base: &str, id: u64) -> String {
    format!("{}/lyric?id={}", base, id)
}

/// The API reports some failures (rate limiting, bad parameters) with HTTP
/// 200 and a non-200 `code` in the body.
fn check_code(endpoint: &str, code: Option<i64>) -> Result<(), LyricsError> {
    match code {
        Some(code) if code != 200 => Err(LyricsError::Api(format!("{}: code {}", endpoint, code))),
        _ => Ok(()),
    }
}

fn first_song_id(resp: SearchResponse) -> Option<u64> {
    resp.result?.songs.first().map(|s| s.id)
}

// Instrumental tracks come back with `nolyric` and no `lrc` object.
fn lyric_from_response(resp: LyricResponse) -> Option<String> {
    resp.lrc?.lyric.filter(|l| !l.trim().is_empty())
}
