pub mod pipe;

pub use pipe::display_lyrics_pipe;
