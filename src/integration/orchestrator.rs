//! Orchestrator for the full voice-dialogue loop
//!
//! Connects the collaborators: STT streams -> conversation store -> turn
//! engine -> interruption guard -> TTS queue. Runs a single dispatcher
//! thread; the store is the only shared mutable state and every turn's event
//! sequence is consumed strictly in emission order.

use crate::convo::{ControlsState, ConversationEntry, ConversationStore, GenerationPhase, Speaker};
use crate::integration::config::SessionConfig;
use crate::interrupt::InterruptGuard;
use crate::stt::SttStreams;
use crate::text::{normalize_whitespace, segment};
use crate::tts::TtsQueue;
use crate::turn::{
    start_turn, ChatMessage, DecodingParams, LanguageBackend, Role, TurnEvent, TurnHandle,
    TurnOptions, TurnRequest,
};
use crate::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Dispatcher tick interval
const TICK: Duration = Duration::from_millis(10);

/// Commands accepted by the orchestrator
#[derive(Debug, Clone)]
pub enum OrchestratorCommand {
    /// Submit a user utterance (typed, or injected by the host)
    SubmitUtterance(String),

    /// Replace the most recent user utterance and regenerate
    SubmitCorrection(String),

    /// Abort the in-flight turn, if any
    StopTurn,

    /// Clear the conversation; ignored while anything is in progress
    Clear,

    /// Shut the orchestrator down
    Shutdown,
}

/// Events emitted by the orchestrator
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// A generation turn has started
    TurnStarted(Uuid),

    /// The conversation log changed; readers should re-snapshot
    ConversationChanged,

    /// Control affordances changed
    ControlsChanged(ControlsState),

    /// A user-visible error occurred
    Error(String),

    /// The orchestrator has shut down
    Shutdown,
}

/// Handle for driving the orchestrator from the host
pub struct OrchestratorHandle {
    command_tx: Sender<OrchestratorCommand>,
    event_rx: Receiver<OrchestratorEvent>,
    store: Arc<ConversationStore>,
}

impl OrchestratorHandle {
    pub fn send_command(&self, command: OrchestratorCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| crate::ColloquyError::Channel(format!("failed to send command: {}", e)))
    }

    pub fn try_recv_event(&self) -> Option<OrchestratorEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<OrchestratorEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Immutable snapshot of the conversation log
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.store.snapshot()
    }

    pub fn controls(&self) -> ControlsState {
        self.store.controls()
    }

    pub fn phase(&self) -> GenerationPhase {
        self.store.phase()
    }
}

/// State carried for the one in-flight turn
struct ActiveTurn {
    handle: TurnHandle,
    /// Index of this turn's assistant entry once the fast path created it
    assistant_index: Option<usize>,
    /// Sentences already queued to TTS for this turn
    spoken: usize,
}

/// Main orchestrator; consumed by [`Orchestrator::start`]
pub struct Orchestrator {
    config: SessionConfig,
    store: Arc<ConversationStore>,
    guard: Arc<InterruptGuard>,
    backend: Box<dyn LanguageBackend>,
    tts: Box<dyn TtsQueue>,
    stt: SttStreams,
    command_rx: Receiver<OrchestratorCommand>,
    event_tx: Sender<OrchestratorEvent>,
}

impl Orchestrator {
    /// Create an orchestrator and its handle.
    ///
    /// Fails fast on invalid configuration, before any turn is attempted.
    pub fn new(
        config: SessionConfig,
        backend: Box<dyn LanguageBackend>,
        tts: Box<dyn TtsQueue>,
        stt: SttStreams,
    ) -> Result<(Self, OrchestratorHandle)> {
        config.validate()?;

        let (command_tx, command_rx) = bounded(100);
        let (event_tx, event_rx) = bounded(100);
        let store = Arc::new(ConversationStore::new());
        let guard = Arc::new(InterruptGuard::new(Arc::new(AtomicBool::new(false))));

        let handle = OrchestratorHandle {
            command_tx,
            event_rx,
            store: Arc::clone(&store),
        };

        let orchestrator = Self {
            config,
            store,
            guard,
            backend,
            tts,
            stt,
            command_rx,
            event_tx,
        };

        Ok((orchestrator, handle))
    }

    /// Start the dispatcher thread, consuming the orchestrator
    pub fn start(self) -> JoinHandle<()> {
        std::thread::spawn(move || self.run())
    }

    fn run(mut self) {
        info!("orchestrator started");
        let barge_in = self.guard.barge_in_flag();
        let mut active: Option<ActiveTurn> = None;
        let mut last_controls: Option<ControlsState> = None;

        'main: loop {
            let mut changed = false;

            // Commands
            loop {
                match self.command_rx.try_recv() {
                    Ok(command) => {
                        if !self.handle_command(command, &mut active, &mut changed) {
                            break 'main;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        warn!("command channel disconnected");
                        break 'main;
                    }
                }
            }

            // Activity flags: latest value only, stale readings are dropped
            if let Some(value) = drain_latest(&self.stt.listening) {
                self.store.set_listening(value);
            }
            if let Some(value) = drain_latest(&self.stt.hearing_speech) {
                self.store.set_hearing_speech(value);
                barge_in.store(value, Ordering::SeqCst);
            }
            if let Some(value) = drain_latest(&self.stt.transcribing) {
                self.store.set_transcribing(value);
            }
            self.store.set_speaking(self.tts.is_speaking());

            // Live caption: only the newest partial matters
            if let Some(partial) = drain_latest(&self.stt.partial_transcripts) {
                if !self.store.update_last_user_streaming_text(partial.clone()) {
                    self.store.add_user_streaming(partial);
                }
                changed = true;
            }

            // Finalized transcripts each start a turn
            while let Ok(text) = self.stt.transcripts.try_recv() {
                self.submit_utterance(text, &mut active);
                changed = true;
            }

            while let Ok(message) = self.stt.errors.try_recv() {
                self.store.add_error(message.clone());
                let _ = self.event_tx.send(OrchestratorEvent::Error(message));
                changed = true;
            }

            // Turn events, strictly in emission order
            let mut finished = false;
            if let Some(turn) = active.as_mut() {
                while let Some(event) = turn.handle.try_recv_event() {
                    let is_finish = event == TurnEvent::Finish;
                    Self::apply_turn_event(
                        event,
                        turn,
                        &self.config,
                        &self.store,
                        &self.guard,
                        self.tts.as_ref(),
                        &self.event_tx,
                        &mut changed,
                    );
                    if is_finish {
                        finished = true;
                        break;
                    }
                }
            }
            if finished {
                active = None;
            }

            // Buffered response: flush on barge-in resolution or expiry
            if let Some(text) = self
                .guard
                .take_if_resolved()
                .or_else(|| self.guard.take_if_expired())
            {
                self.commit_final(&text, &mut changed);
            }

            if changed {
                let _ = self.event_tx.send(OrchestratorEvent::ConversationChanged);
            }

            let controls = self.store.controls();
            if last_controls.as_ref() != Some(&controls) {
                let _ = self
                    .event_tx
                    .send(OrchestratorEvent::ControlsChanged(controls.clone()));
                last_controls = Some(controls);
            }

            std::thread::sleep(TICK);
        }

        if let Some(turn) = active.take() {
            turn.handle.abort();
        }
        let _ = self.event_tx.send(OrchestratorEvent::Shutdown);
        info!("orchestrator stopped");
    }

    /// Returns false when the orchestrator should shut down
    fn handle_command(
        &mut self,
        command: OrchestratorCommand,
        active: &mut Option<ActiveTurn>,
        changed: &mut bool,
    ) -> bool {
        match command {
            OrchestratorCommand::SubmitUtterance(text) => {
                self.submit_utterance(text, active);
                *changed = true;
            }
            OrchestratorCommand::SubmitCorrection(text) => {
                let text = normalize_whitespace(&text);
                if text.is_empty() {
                    return true;
                }
                self.teardown_turn(active);
                self.store.replace_last_user(text);
                self.begin_turn(active);
                *changed = true;
            }
            OrchestratorCommand::StopTurn => {
                self.teardown_turn(active);
                debug!("turn stopped by request");
            }
            OrchestratorCommand::Clear => {
                if self.store.clear() {
                    self.guard.discard_pending();
                    *changed = true;
                } else {
                    debug!("clear ignored while activity in progress");
                }
            }
            OrchestratorCommand::Shutdown => {
                info!("orchestrator shutdown requested");
                return false;
            }
        }
        true
    }

    /// Commit a user utterance and start its generation turn
    fn submit_utterance(&mut self, text: String, active: &mut Option<ActiveTurn>) {
        let text = normalize_whitespace(&text);
        if text.is_empty() {
            return;
        }

        self.teardown_turn(active);

        // A final transcript completes the entry that has been showing the
        // live caption; a typed utterance appends a fresh one
        let streaming_tail = self
            .store
            .snapshot()
            .last()
            .map(|entry| entry.is_streaming_user())
            .unwrap_or(false);
        if streaming_tail {
            self.store.replace_last_user(text);
        } else {
            self.store.add_user(text);
        }

        self.begin_turn(active);
    }

    /// Abort the in-flight turn and drop any superseded buffered response
    fn teardown_turn(&mut self, active: &mut Option<ActiveTurn>) {
        if let Some(turn) = active.take() {
            debug!(turn = %turn.handle.id(), "tearing down in-flight turn");
            turn.handle.abort();
            // Drop joins the worker, so no event outlives the handle
        }
        if let Some(discarded) = self.guard.discard_pending() {
            warn!(
                chars = discarded.len(),
                "buffered response superseded before delivery"
            );
        }
        self.store.set_phase(GenerationPhase::Idle);
    }

    fn begin_turn(&mut self, active: &mut Option<ActiveTurn>) {
        let single_shot = self.config.search_grounding;
        let phase = if single_shot {
            GenerationPhase::SingleShotGenerating
        } else {
            GenerationPhase::GeneratingFirst
        };
        self.store.set_phase(phase);

        let request = TurnRequest {
            system_prompt: self.config.effective_system_prompt(),
            history: self.history(),
            model_id: self.config.model_id.clone(),
            decoding: DecodingParams {
                temperature: self.config.temperature,
                search_grounding: single_shot,
            },
        };
        let options = TurnOptions {
            faster_first: self.config.faster_first && !single_shot,
            single_shot,
        };

        match start_turn(self.backend.as_mut(), request, options) {
            Ok(handle) => {
                let _ = self.event_tx.send(OrchestratorEvent::TurnStarted(handle.id()));
                *active = Some(ActiveTurn {
                    handle,
                    assistant_index: None,
                    spoken: 0,
                });
            }
            Err(e) => {
                error!(error = %e, "failed to start turn");
                self.store.add_error(e.user_message());
                self.store.set_phase(GenerationPhase::Idle);
                let _ = self.event_tx.send(OrchestratorEvent::Error(e.to_string()));
            }
        }
    }

    /// Chat history for the backend: committed user and assistant entries
    /// only; system and error entries are turn-adjacent, not model context
    fn history(&self) -> Vec<ChatMessage> {
        self.store
            .snapshot()
            .iter()
            .filter(|entry| !entry.sentences.is_empty())
            .filter_map(|entry| match entry.speaker {
                Speaker::You => Some(ChatMessage {
                    role: Role::User,
                    content: entry.text(),
                }),
                Speaker::Assistant => Some(ChatMessage {
                    role: Role::Assistant,
                    content: entry.text(),
                }),
                _ => None,
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_turn_event(
        event: TurnEvent,
        turn: &mut ActiveTurn,
        config: &SessionConfig,
        store: &ConversationStore,
        guard: &InterruptGuard,
        tts: &dyn TtsQueue,
        event_tx: &Sender<OrchestratorEvent>,
        changed: &mut bool,
    ) {
        match event {
            TurnEvent::FirstSentence(sentence) => {
                store.set_phase(GenerationPhase::GeneratingRemainder);
                let index = store.add_assistant(vec![sentence.clone()]);
                turn.assistant_index = Some(index);
                turn.spoken = 1;
                if let Err(e) = tts.queue(&sentence) {
                    warn!(error = %e, "TTS queue rejected first sentence");
                }
                *changed = true;
            }
            TurnEvent::RemainingSentences(sentences) => match turn.assistant_index {
                Some(index) => {
                    store.append_assistant_sentences(index, sentences.clone());
                    for sentence in &sentences {
                        if turn.spoken >= config.max_sentences {
                            debug!(cap = config.max_sentences, "sentence cap reached, not spoken");
                            break;
                        }
                        if let Err(e) = tts.queue(sentence) {
                            warn!(error = %e, "TTS queue rejected sentence");
                            break;
                        }
                        turn.spoken += 1;
                    }
                    *changed = true;
                }
                None => {
                    // Remainder without a first sentence is a benign race,
                    // absorbed rather than surfaced
                    debug!("remaining sentences with no assistant entry, ignored");
                }
            },
            TurnEvent::FinalResponse(full) => {
                if guard.maybe_hold_final_response(&full) {
                    debug!("final response buffered pending barge-in");
                } else {
                    Self::commit_final_inner(&full, turn.assistant_index, config, store, tts, changed);
                }
            }
            TurnEvent::System(message) => {
                store.add_system(message);
                *changed = true;
            }
            TurnEvent::Error(message) => {
                store.add_error(message.clone());
                store.set_phase(GenerationPhase::Idle);
                let _ = event_tx.send(OrchestratorEvent::Error(message));
                *changed = true;
            }
            TurnEvent::Finish => {
                debug!(turn = %turn.handle.id(), "turn finished, per-turn state released");
            }
        }
    }

    fn commit_final(&self, full: &str, changed: &mut bool) {
        Self::commit_final_inner(full, None, &self.config, &self.store, self.tts.as_ref(), changed);
    }

    /// The current exchange's assistant entry, if the fast path created one:
    /// the most recent assistant entry appended after the last committed user
    /// utterance. Entries from earlier exchanges never qualify.
    fn current_assistant_index(snapshot: &[ConversationEntry]) -> Option<usize> {
        let start = snapshot
            .iter()
            .rposition(|e| e.speaker == Speaker::You)
            .map_or(0, |i| i + 1);
        snapshot[start..]
            .iter()
            .rposition(|e| e.is_assistant)
            .map(|offset| start + offset)
    }

    /// Deliver a completed response, surviving the duplicate-delivery race
    /// between the fast path and the full-response path: if this turn's
    /// assistant entry already carries a prefix of the sentences, only the
    /// missing tail (if any) is appended. System and error entries landing
    /// after the assistant entry mid-turn do not defeat the check.
    fn commit_final_inner(
        full: &str,
        assistant_index: Option<usize>,
        config: &SessionConfig,
        store: &ConversationStore,
        tts: &dyn TtsQueue,
        changed: &mut bool,
    ) {
        let sentences = segment(full);
        if sentences.is_empty() {
            store.add_system("The model returned an empty response.");
            store.set_phase(GenerationPhase::Idle);
            *changed = true;
            return;
        }

        let snapshot = store.snapshot();
        let existing = assistant_index
            .or_else(|| Self::current_assistant_index(&snapshot))
            .and_then(|index| {
                snapshot.get(index).and_then(|entry| {
                    if entry.is_assistant
                        && !entry.sentences.is_empty()
                        && sentences.starts_with(&entry.sentences)
                    {
                        Some((index, entry.sentences.len()))
                    } else {
                        None
                    }
                })
            });

        match existing {
            Some((index, have)) => {
                let tail: Vec<String> = sentences[have..].to_vec();
                if !tail.is_empty() {
                    store.append_assistant_sentences(index, tail.clone());
                    for (offset, sentence) in tail.iter().enumerate() {
                        if have + offset >= config.max_sentences {
                            break;
                        }
                        if tts.queue(sentence).is_err() {
                            break;
                        }
                    }
                }
            }
            None => {
                store.add_assistant(sentences.clone());
                for (i, sentence) in sentences.iter().enumerate() {
                    if i >= config.max_sentences {
                        debug!(cap = config.max_sentences, "sentence cap reached, not spoken");
                        break;
                    }
                    if tts.queue(sentence).is_err() {
                        break;
                    }
                }
            }
        }

        store.set_phase(GenerationPhase::Idle);
        *changed = true;
    }
}

/// Drain a stream down to its most recent value
fn drain_latest<T>(rx: &Receiver<T>) -> Option<T> {
    let mut latest = None;
    while let Ok(value) = rx.try_recv() {
        latest = Some(value);
    }
    latest
}
