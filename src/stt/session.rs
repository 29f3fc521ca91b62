//! STT session boundary: a bundle of independently-progressing streams
//!
//! The concrete recognizer lives outside this crate. It publishes into the
//! sender half of the bundle from its own worker threads; the orchestrator
//! consumes the receiver half. Flag streams carry latest-value semantics:
//! slow consumers drain to the newest value instead of replaying history.
//!
//! Teardown order matters: `release` signals shutdown and joins every
//! producer worker before the underlying connection drops, so no event is
//! ever delivered after shutdown. Only one live session of a kind at a time;
//! swapping credentials means releasing the old session fully first.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Receiver half of the STT stream bundle, consumed by the orchestrator
pub struct SttStreams {
    /// Finalized transcripts, one per completed utterance
    pub transcripts: Receiver<String>,
    /// Live partial transcript of the in-flight utterance
    pub partial_transcripts: Receiver<String>,
    /// Human-readable recognizer errors
    pub errors: Receiver<String>,
    /// Capture session active
    pub listening: Receiver<bool>,
    /// Voice activity detected in the capture stream
    pub hearing_speech: Receiver<bool>,
    /// Recognizer busy turning audio into text
    pub transcribing: Receiver<bool>,
}

/// Sender half of the STT stream bundle, driven by the recognizer adapter
#[derive(Clone)]
pub struct SttStreamSenders {
    pub transcripts: Sender<String>,
    pub partial_transcripts: Sender<String>,
    pub errors: Sender<String>,
    pub listening: Sender<bool>,
    pub hearing_speech: Sender<bool>,
    pub transcribing: Sender<bool>,
}

/// Create a connected STT stream bundle
pub fn stt_channels(capacity: usize) -> (SttStreamSenders, SttStreams) {
    let (transcripts_tx, transcripts_rx) = bounded(capacity);
    let (partials_tx, partials_rx) = bounded(capacity);
    let (errors_tx, errors_rx) = bounded(capacity);
    let (listening_tx, listening_rx) = bounded(capacity);
    let (hearing_tx, hearing_rx) = bounded(capacity);
    let (transcribing_tx, transcribing_rx) = bounded(capacity);

    (
        SttStreamSenders {
            transcripts: transcripts_tx,
            partial_transcripts: partials_tx,
            errors: errors_tx,
            listening: listening_tx,
            hearing_speech: hearing_tx,
            transcribing: transcribing_tx,
        },
        SttStreams {
            transcripts: transcripts_rx,
            partial_transcripts: partials_rx,
            errors: errors_rx,
            listening: listening_rx,
            hearing_speech: hearing_rx,
            transcribing: transcribing_rx,
        },
    )
}

/// Owner of a live recognizer session's worker threads
pub struct SttSession {
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl SttSession {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Shared shutdown flag; producer workers must poll it and exit promptly
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Register a producer worker owned by this session
    pub fn attach_worker(&mut self, worker: JoinHandle<()>) {
        self.workers.push(worker);
    }

    /// Tear the session down: signal shutdown, then join every producer
    /// worker before returning, so the underlying connection can be dropped
    /// with no event still in flight.
    pub fn release(mut self) {
        info!("releasing STT session");
        self.shutdown.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("STT session released");
    }
}

impl Default for SttSession {
    fn default() -> Self {
        Self::new()
    }
}
