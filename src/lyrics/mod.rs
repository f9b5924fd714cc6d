// lyrics/mod.rs - tagged lyrics parsing and the NetEase provider
pub mod parse;
pub mod providers;
pub mod types;

pub use parse::parse;
pub use providers::NeteaseClient;
pub use types::{LyricsDocument, LyricsError, Sentinel, UNAVAILABLE_LINE};
