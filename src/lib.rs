pub mod audio;
pub mod convo;
pub mod integration;
pub mod interrupt;
pub mod stt;
pub mod text;
pub mod tts;
pub mod turn;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ColloquyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl ColloquyError {
    /// Check if this error is recoverable by retrying the turn
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Requires fixing credentials or settings first
            ColloquyError::Config(_) => false,
            // Typically transient network failures
            ColloquyError::Transport(_) => true,
            ColloquyError::Protocol(_) => true,
            // Benign races between delivery paths, absorbed locally
            ColloquyError::State(_) => true,
            ColloquyError::Channel(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ColloquyError::Config(_) => {
                "Configuration error. Please check your model and API key settings.".to_string()
            }
            ColloquyError::Transport(_) => {
                "Network error while contacting the model. Please try again.".to_string()
            }
            ColloquyError::Protocol(_) => {
                "The model returned an unexpected response. Please try again.".to_string()
            }
            ColloquyError::State(_) => {
                "Conversation state changed mid-operation. Please try again.".to_string()
            }
            ColloquyError::Channel(_) => {
                "Internal communication error. Please restart the session.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ColloquyError>;
