use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    You,
    Assistant,
    System,
    Error,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::You => write!(f, "You"),
            Speaker::Assistant => write!(f, "Assistant"),
            Speaker::System => write!(f, "System"),
            Speaker::Error => write!(f, "Error"),
        }
    }
}

/// One entry in the conversation log
///
/// Sentences are append-only while a response streams in; `streaming_text`
/// carries the live caption of an in-flight user utterance and is cleared
/// once the final transcript commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub speaker: Speaker,
    pub sentences: Vec<String>,
    pub is_assistant: bool,
    pub streaming_text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    fn new(speaker: Speaker, sentences: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            is_assistant: speaker == Speaker::Assistant,
            sentences,
            streaming_text: None,
            timestamp: Utc::now(),
        }
    }

    /// A committed user utterance
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::You, vec![text.into()])
    }

    /// A user utterance still being transcribed (live caption only)
    pub fn user_streaming(partial: impl Into<String>) -> Self {
        let mut entry = Self::new(Speaker::You, Vec::new());
        entry.streaming_text = Some(partial.into());
        entry
    }

    /// An assistant response, possibly partial while streaming
    pub fn assistant(sentences: Vec<String>) -> Self {
        Self::new(Speaker::Assistant, sentences)
    }

    /// A turn-adjacent informational message
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Speaker::System, vec![text.into()])
    }

    /// A user-visible failure
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Speaker::Error, vec![text.into()])
    }

    /// Full text of the entry, sentences joined with single spaces
    pub fn text(&self) -> String {
        self.sentences.join(" ")
    }

    /// Whether this user entry is still waiting for its final transcript
    pub fn is_streaming_user(&self) -> bool {
        self.speaker == Speaker::You
            && (self.streaming_text.is_some() || self.sentences.is_empty())
    }
}

/// Latest-value activity flags published by the collaborators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityFlags {
    pub is_speaking: bool,
    pub is_listening: bool,
    pub is_hearing_speech: bool,
    pub is_transcribing: bool,
}

impl ActivityFlags {
    /// True when any collaborator is mid-activity
    pub fn any_active(&self) -> bool {
        self.is_speaking || self.is_listening || self.is_hearing_speech || self.is_transcribing
    }
}
