//! Text-to-speech collaborator boundary
//!
//! The core only needs FIFO text queueing and a speaking-state flag; the
//! synthesis engine itself lives outside this crate.

use crate::{ColloquyError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ordered text sink for playback
pub trait TtsQueue: Send {
    /// Queue text for playback after everything already queued
    fn queue(&self, text: &str) -> Result<()>;

    /// Whether playback is currently audible
    fn is_speaking(&self) -> bool;
}

/// Channel-backed queue handle for an external synthesis worker
pub struct ChannelTts {
    tx: Sender<String>,
    speaking: Arc<AtomicBool>,
}

impl ChannelTts {
    /// Returns the handle, the consumer end for the synthesis worker, and
    /// the shared speaking flag the worker should maintain.
    pub fn new(capacity: usize) -> (Self, Receiver<String>, Arc<AtomicBool>) {
        let (tx, rx) = bounded(capacity);
        let speaking = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx,
                speaking: Arc::clone(&speaking),
            },
            rx,
            speaking,
        )
    }
}

impl TtsQueue for ChannelTts {
    fn queue(&self, text: &str) -> Result<()> {
        self.tx
            .send(text.to_string())
            .map_err(|e| ColloquyError::Channel(format!("TTS queue closed: {}", e)))
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}
