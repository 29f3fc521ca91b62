//! Per-turn worker that converts streamed backend chunks into ordered events
//!
//! One worker thread per turn; concurrent turns are not supported. Starting
//! a new turn requires tearing down the previous handle first, which aborts
//! its worker and joins it.

use crate::text::segment;
use crate::turn::backend::{BackendChunk, LanguageBackend, TurnRequest};
use crate::turn::events::TurnEvent;
use crate::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

/// How often the worker wakes up to check for an abort
const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-turn behavior knobs, resolved from session config by the caller
#[derive(Debug, Clone, Copy)]
pub struct TurnOptions {
    /// Deliver the first complete sentence before the response finishes
    pub faster_first: bool,
    /// Non-streaming turn: no fast path, content arrives only at the end
    pub single_shot: bool,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            faster_first: true,
            single_shot: false,
        }
    }
}

/// Handle to a running turn
///
/// Dropping the handle aborts the worker and joins it, so events are never
/// delivered after teardown.
pub struct TurnHandle {
    id: Uuid,
    event_rx: Receiver<TurnEvent>,
    abort: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TurnHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Non-blocking event poll
    pub fn try_recv_event(&self) -> Option<TurnEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocking event receive with timeout
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<TurnEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Request that the worker stop; `Finish` is still emitted
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }
}

impl Drop for TurnHandle {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Start one generation turn against the backend.
///
/// Returns a handle whose event stream obeys the ordering contract of
/// [`TurnEvent`]. Backend connection failures surface here, before any
/// worker is spawned or event emitted.
pub fn start_turn(
    backend: &mut dyn LanguageBackend,
    request: TurnRequest,
    options: TurnOptions,
) -> Result<TurnHandle> {
    let id = Uuid::new_v4();
    let chunk_rx = backend.generate(&request)?;
    // Unbounded so a torn-down turn can never wedge its worker on a full
    // event channel while the handle joins it
    let (event_tx, event_rx) = unbounded();
    let abort = Arc::new(AtomicBool::new(false));

    debug!(turn = %id, model = %request.model_id, single_shot = options.single_shot, "turn started");

    let worker_abort = Arc::clone(&abort);
    let worker = std::thread::spawn(move || {
        run_turn(id, chunk_rx, event_tx, options, worker_abort);
    });

    Ok(TurnHandle {
        id,
        event_rx,
        abort,
        worker: Some(worker),
    })
}

fn run_turn(
    id: Uuid,
    chunk_rx: Receiver<BackendChunk>,
    event_tx: Sender<TurnEvent>,
    options: TurnOptions,
    abort: Arc<AtomicBool>,
) {
    let started = Instant::now();
    let mut accumulated = String::new();
    let mut delivered = 0usize;
    let mut first_sentence_ms: Option<u64> = None;
    let mut failure: Option<String> = None;

    loop {
        if abort.load(Ordering::SeqCst) {
            debug!(turn = %id, "turn aborted");
            let _ = event_tx.send(TurnEvent::Finish);
            return;
        }

        match chunk_rx.recv_timeout(ABORT_POLL_INTERVAL) {
            Ok(BackendChunk::Delta(text)) => {
                accumulated.push_str(&text);

                if options.faster_first && !options.single_shot {
                    let sentences = segment(&accumulated);
                    // The last element may still be growing; everything
                    // before it is a stable, complete sentence
                    let complete = sentences.len().saturating_sub(1);

                    if delivered == 0 && complete >= 1 {
                        first_sentence_ms = Some(started.elapsed().as_millis() as u64);
                        let _ = event_tx.send(TurnEvent::FirstSentence(sentences[0].clone()));
                        delivered = 1;
                    }
                    if delivered > 0 && complete > delivered {
                        let _ = event_tx.send(TurnEvent::RemainingSentences(
                            sentences[delivered..complete].to_vec(),
                        ));
                        delivered = complete;
                    }
                }
            }
            Ok(BackendChunk::Grounding(note)) => {
                let _ = event_tx.send(TurnEvent::System(note));
            }
            Ok(BackendChunk::Done) => break,
            Ok(BackendChunk::Failed(message)) => {
                failure = Some(message);
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                failure = Some("response stream closed before completion".to_string());
                break;
            }
        }
    }

    match failure {
        Some(message) => {
            error!(turn = %id, error = %message, "turn failed");
            let _ = event_tx.send(TurnEvent::Error(message));
        }
        None => {
            let sentences = segment(&accumulated);
            if delivered > 0 && sentences.len() > delivered {
                let _ = event_tx.send(TurnEvent::RemainingSentences(
                    sentences[delivered..].to_vec(),
                ));
            }
            let _ = event_tx.send(TurnEvent::FinalResponse(sentences.join(" ")));
        }
    }

    info!(
        turn = %id,
        total_ms = started.elapsed().as_millis() as u64,
        first_sentence_ms,
        "turn finished"
    );
    let _ = event_tx.send(TurnEvent::Finish);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::backend::{ChatMessage, DecodingParams};
    use crossbeam_channel::bounded;

    struct ScriptedBackend {
        chunks: Vec<BackendChunk>,
    }

    impl LanguageBackend for ScriptedBackend {
        fn generate(&mut self, _request: &TurnRequest) -> Result<Receiver<BackendChunk>> {
            let (tx, rx) = bounded(64);
            let chunks = self.chunks.clone();
            std::thread::spawn(move || {
                for chunk in chunks {
                    if tx.send(chunk).is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn request() -> TurnRequest {
        TurnRequest {
            system_prompt: "Be helpful.".to_string(),
            history: vec![ChatMessage::user("tell me something")],
            model_id: "test-model".to_string(),
            decoding: DecodingParams::default(),
        }
    }

    fn collect_events(handle: &TurnHandle) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.recv_event_timeout(Duration::from_secs(2)) {
            let finished = event == TurnEvent::Finish;
            events.push(event);
            if finished {
                break;
            }
        }
        events
    }

    fn run_scripted(chunks: Vec<BackendChunk>, options: TurnOptions) -> Vec<TurnEvent> {
        let mut backend = ScriptedBackend { chunks };
        let handle = start_turn(&mut backend, request(), options).unwrap();
        collect_events(&handle)
    }

    #[test]
    fn test_streaming_turn_event_order() {
        let events = run_scripted(
            vec![
                BackendChunk::Delta("The first sentence arrives here. ".to_string()),
                BackendChunk::Delta("The second sentence is also long. ".to_string()),
                BackendChunk::Delta("And a third one rounds it all out.".to_string()),
                BackendChunk::Done,
            ],
            TurnOptions::default(),
        );

        assert_eq!(
            events.first(),
            Some(&TurnEvent::FirstSentence(
                "The first sentence arrives here.".to_string()
            ))
        );
        assert_eq!(events.last(), Some(&TurnEvent::Finish));

        let final_index = events
            .iter()
            .position(|e| matches!(e, TurnEvent::FinalResponse(_)))
            .expect("final response emitted");
        assert_eq!(final_index, events.len() - 2);

        // No remaining-sentences event before the first sentence, none after
        // the terminal event
        for (i, event) in events.iter().enumerate() {
            if matches!(event, TurnEvent::RemainingSentences(_)) {
                assert!(i > 0 && i < final_index);
            }
        }
    }

    #[test]
    fn test_remaining_sentences_carry_only_new_content() {
        let events = run_scripted(
            vec![
                BackendChunk::Delta("Sentence number one is long enough. ".to_string()),
                BackendChunk::Delta("Sentence number two is long enough. ".to_string()),
                BackendChunk::Delta("Sentence number three is long enough.".to_string()),
                BackendChunk::Done,
            ],
            TurnOptions::default(),
        );

        let mut seen: Vec<String> = Vec::new();
        for event in &events {
            match event {
                TurnEvent::FirstSentence(s) => seen.push(s.clone()),
                TurnEvent::RemainingSentences(list) => {
                    for s in list {
                        assert!(!seen.contains(s), "duplicate sentence delivered: {s}");
                        seen.push(s.clone());
                    }
                }
                _ => {}
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_full_text_matches_delivered_sentences() {
        let chunks = vec![
            BackendChunk::Delta("Alpha sentence streaming in right now. ".to_string()),
            BackendChunk::Delta("Beta sentence streaming in right after.".to_string()),
            BackendChunk::Done,
        ];
        let events = run_scripted(chunks, TurnOptions::default());

        let mut delivered: Vec<String> = Vec::new();
        let mut full = String::new();
        for event in events {
            match event {
                TurnEvent::FirstSentence(s) => delivered.push(s),
                TurnEvent::RemainingSentences(list) => delivered.extend(list),
                TurnEvent::FinalResponse(text) => full = text,
                _ => {}
            }
        }
        assert_eq!(delivered.join(" "), full);
    }

    #[test]
    fn test_single_shot_emits_no_fast_path() {
        let events = run_scripted(
            vec![
                BackendChunk::Grounding("2 sources consulted".to_string()),
                BackendChunk::Delta("Grounded answer sentence number one. ".to_string()),
                BackendChunk::Delta("Grounded answer sentence number two.".to_string()),
                BackendChunk::Done,
            ],
            TurnOptions {
                faster_first: true,
                single_shot: true,
            },
        );

        assert!(events
            .iter()
            .all(|e| !matches!(e, TurnEvent::FirstSentence(_) | TurnEvent::RemainingSentences(_))));
        assert!(events
            .iter()
            .any(|e| matches!(e, TurnEvent::System(note) if note.contains("sources"))));
        assert!(events
            .iter()
            .any(|e| matches!(e, TurnEvent::FinalResponse(text) if text.contains("number two"))));
    }

    #[test]
    fn test_faster_first_disabled_delivers_everything_at_final() {
        let events = run_scripted(
            vec![
                BackendChunk::Delta("A perfectly long first sentence here. ".to_string()),
                BackendChunk::Delta("A perfectly long second sentence too.".to_string()),
                BackendChunk::Done,
            ],
            TurnOptions {
                faster_first: false,
                single_shot: false,
            },
        );

        assert!(events
            .iter()
            .all(|e| !matches!(e, TurnEvent::FirstSentence(_))));
        assert!(matches!(events[0], TurnEvent::FinalResponse(_)));
    }

    #[test]
    fn test_failure_emits_error_then_finish() {
        let events = run_scripted(
            vec![
                BackendChunk::Delta("Partial text before the line drops. ".to_string()),
                BackendChunk::Failed("connection reset".to_string()),
            ],
            TurnOptions::default(),
        );

        let error_index = events
            .iter()
            .position(|e| matches!(e, TurnEvent::Error(msg) if msg == "connection reset"))
            .expect("error emitted");
        assert_eq!(events.last(), Some(&TurnEvent::Finish));
        assert_eq!(error_index, events.len() - 2);
        assert!(events
            .iter()
            .all(|e| !matches!(e, TurnEvent::FinalResponse(_))));
    }

    #[test]
    fn test_dropped_stream_is_a_protocol_failure() {
        // Sender dropped without Done or Failed
        let events = run_scripted(
            vec![BackendChunk::Delta("Some partial content arrives.".to_string())],
            TurnOptions::default(),
        );

        assert!(events.iter().any(|e| matches!(e, TurnEvent::Error(_))));
        assert_eq!(events.last(), Some(&TurnEvent::Finish));
    }

    #[test]
    fn test_empty_success_yields_empty_final_response() {
        let events = run_scripted(vec![BackendChunk::Done], TurnOptions::default());
        assert_eq!(
            events,
            vec![TurnEvent::FinalResponse(String::new()), TurnEvent::Finish]
        );
    }

    #[test]
    fn test_abort_still_finishes() {
        struct StallingBackend;
        impl LanguageBackend for StallingBackend {
            fn generate(&mut self, _request: &TurnRequest) -> Result<Receiver<BackendChunk>> {
                // Keep the sender alive so the stream never ends on its own
                let (tx, rx) = bounded(1);
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_secs(5));
                    drop(tx);
                });
                Ok(rx)
            }
        }

        let mut backend = StallingBackend;
        let handle = start_turn(&mut backend, request(), TurnOptions::default()).unwrap();
        handle.abort();

        let event = handle.recv_event_timeout(Duration::from_secs(2));
        assert_eq!(event, Some(TurnEvent::Finish));
    }
}
