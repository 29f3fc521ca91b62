//! Language-model collaborator boundary
//!
//! The concrete HTTP/WebSocket client lives outside this crate; the engine
//! only sees a request and a stream of chunks over a channel. A backend must
//! signal failure distinctly from an empty-but-successful response: `Done`
//! with no preceding `Delta` is empty success, `Failed` is failure.

use crate::Result;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

/// Role of a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of the ordered chat history sent with a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Optional decoding parameters for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    pub temperature: f32,
    pub search_grounding: bool,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            search_grounding: false,
        }
    }
}

/// Everything a backend needs to run one generation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub model_id: String,
    pub decoding: DecodingParams,
}

/// A unit of streamed backend output
#[derive(Debug, Clone, PartialEq)]
pub enum BackendChunk {
    /// A fragment of generated text
    Delta(String),
    /// A grounding/citation note, surfaced as a system message
    Grounding(String),
    /// Generation finished successfully (possibly with no text at all)
    Done,
    /// Generation failed; no further chunks follow
    Failed(String),
}

/// The LLM collaborator as seen by the turn engine.
///
/// `generate` returns immediately with the receiving end of the chunk
/// stream; errors raised here (bad credentials, connect failure) abort the
/// turn before any event is emitted.
pub trait LanguageBackend: Send {
    fn generate(&mut self, request: &TurnRequest) -> Result<Receiver<BackendChunk>>;
}
