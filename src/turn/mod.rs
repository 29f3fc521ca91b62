//! Turn engine: one user utterance, one LLM call, one assistant utterance

pub mod backend;
pub mod engine;
pub mod events;

pub use backend::{BackendChunk, ChatMessage, DecodingParams, LanguageBackend, Role, TurnRequest};
pub use engine::{start_turn, TurnHandle, TurnOptions};
pub use events::TurnEvent;
