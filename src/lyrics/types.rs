use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// Shared HTTP client with reasonable defaults for timeouts
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("NeteaseLyrics/0.1")
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

/// Returned by `current_line` when no entry covers the estimated position.
pub const UNAVAILABLE_LINE: &str = "无法获取当前歌词";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricLine {
    /// Seconds from the start of the track.
    pub time: f64,
    pub text: String,
}

/// Parsed, immutable lyrics for one track.
///
/// Cloning is cheap: the lines are shared behind an `Arc`, so snapshots of
/// the playback state can carry the document around freely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricsDocument {
    pub lines: Arc<Vec<LyricLine>>,
    /// Tagged text the document was parsed from.
    pub raw: String,
}

impl LyricsDocument {
    pub fn new(lines: Vec<LyricLine>, raw: impl Into<String>) -> Self {
        Self {
            lines: Arc::new(lines),
            raw: raw.into(),
        }
    }

    /// Index of the last line whose timestamp is at or before `position`.
    pub fn index_at(&self, position: f64) -> Option<usize> {
        if position.is_nan() {
            return None;
        }
        // Lines are sorted, so everything before the partition point starts
        // at or before `position`.
        let idx = self.lines.partition_point(|line| line.time <= position);
        idx.checked_sub(1)
    }

    /// Index `j` of the first line after the first one that starts at or
    /// after `position`; the pair `(j - 1, j)` brackets the position.
    ///
    /// `None` before the first line and past the last one.
    pub fn span_end_at(&self, position: f64) -> Option<usize> {
        let first = self.lines.first()?;
        if position.is_nan() || position < first.time {
            return None;
        }
        let j = self.lines.partition_point(|line| line.time < position).max(1);
        (j < self.lines.len()).then_some(j)
    }
}

/// Placeholder documents shown while real lyrics are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Searching,
    SongNotFound,
    LyricsNotFound,
    Reset,
    Unavailable,
}

impl Sentinel {
    pub fn message(self) -> &'static str {
        match self {
            Sentinel::Searching => "搜索歌词中",
            Sentinel::SongNotFound => "未找到歌曲",
            Sentinel::LyricsNotFound => "未找到歌词",
            Sentinel::Reset => "歌曲信息重置",
            Sentinel::Unavailable => UNAVAILABLE_LINE,
        }
    }

    /// The sentinel as a two-entry document: the message at zero and an
    /// empty terminator far past any real track.
    pub fn document(self) -> LyricsDocument {
        let message = self.message();
        LyricsDocument::new(
            vec![
                LyricLine {
                    time: 0.0,
                    text: message.to_string(),
                },
                LyricLine {
                    time: 23.0 * 60.0 + 59.59,
                    text: String::new(),
                },
            ],
            format!("[00:00.00]{}[23:59.59]", message),
        )
    }
}

#[derive(Error, Debug)]
pub enum LyricsError {
    #[error("Malformed time tag: [{tag}]")]
    MalformedTag { tag: String },
    #[error("No timed lines in lyrics text")]
    NoTimedLines,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Song not found")]
    SongNotFound,
    #[error("Lyrics not found")]
    LyricsNotFound,
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl LyricsError {
    /// Document shown in place of lyrics when this error ends a fetch.
    pub fn sentinel(&self) -> Sentinel {
        match self {
            LyricsError::SongNotFound => Sentinel::SongNotFound,
            LyricsError::LyricsNotFound | LyricsError::NoTimedLines => Sentinel::LyricsNotFound,
            _ => Sentinel::Unavailable,
        }
    }
}

pub(crate) fn http_client() -> &'static Client {
    &HTTP_CLIENT
}
