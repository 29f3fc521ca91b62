//! Text processing for bridging LLM output to TTS input

pub mod segmenter;

pub use segmenter::{normalize_whitespace, segment, MIN_SENTENCE_CHARS};
