//! Speech-to-text collaborator boundary

pub mod session;

pub use session::{stt_channels, SttSession, SttStreamSenders, SttStreams};
