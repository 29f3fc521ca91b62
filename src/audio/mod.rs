//! Audio analysis helpers for voice-activity gating

pub mod level;

pub use level::{is_speech_level, rms, to_dbfs, FULL_SCALE};
