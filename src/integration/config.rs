//! Session configuration
//!
//! Values supplied by the host's preference store, read once at session
//! setup. None of these participate in the runtime state machine.

use crate::{ColloquyError, Result};

/// Default system prompt for spoken conversation
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful voice assistant. \
Answer in short, complete sentences suitable for being read aloud. \
Avoid markdown, lists, and code unless explicitly asked.";

/// Configuration for one conversation session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Target model identifier
    pub model_id: String,

    /// Backend credential; checked before any network call
    pub api_key: String,

    /// Sampling temperature passed through to the backend
    pub temperature: f32,

    /// Route turns through the non-streaming, search-grounded path
    pub search_grounding: bool,

    /// Deliver the first complete sentence before the response finishes
    pub faster_first: bool,

    /// Upper bound on sentences spoken per turn (the log always keeps all)
    pub max_sentences: usize,

    /// Cap on a single listening window, in seconds
    pub listen_duration_secs: u64,

    /// Re-open the microphone after the assistant finishes speaking
    pub auto_listen: bool,

    /// Base system prompt
    pub system_prompt: String,

    /// Extensions appended to the system prompt, in order
    pub prompt_extensions: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_id: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            temperature: 0.7,
            search_grounding: false,
            faster_first: true,
            max_sentences: 64,
            listen_duration_secs: 30,
            auto_listen: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt_extensions: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_search_grounding(mut self, enabled: bool) -> Self {
        self.search_grounding = enabled;
        self
    }

    pub fn with_faster_first(mut self, enabled: bool) -> Self {
        self.faster_first = enabled;
        self
    }

    pub fn with_max_sentences(mut self, max: usize) -> Self {
        self.max_sentences = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_prompt_extension(mut self, extension: impl Into<String>) -> Self {
        self.prompt_extensions.push(extension.into());
        self
    }

    /// Base prompt plus extensions, in order
    pub fn effective_system_prompt(&self) -> String {
        if self.prompt_extensions.is_empty() {
            return self.system_prompt.clone();
        }
        let mut parts = Vec::with_capacity(1 + self.prompt_extensions.len());
        parts.push(self.system_prompt.clone());
        parts.extend(self.prompt_extensions.iter().cloned());
        parts.join("\n\n")
    }

    /// Fail fast on a configuration that could never complete a turn
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(ColloquyError::Config("model id is required".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ColloquyError::Config("API key is required".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ColloquyError::Config(format!(
                "temperature {} out of range [0, 2]",
                self.temperature
            )));
        }
        if self.max_sentences == 0 {
            return Err(ColloquyError::Config(
                "max sentences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
