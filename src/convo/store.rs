//! Single-owner conversation store
//!
//! Exclusive owner of the conversation log, the generation phase, and the
//! activity flags. All mutations go through this store and are serialized by
//! its write lock; readers only ever get cloned snapshots, never a reference
//! into the live log. This is what prevents duplicate-append races between
//! the fast-path and full-response delivery paths.

use crate::convo::controls::{derive_controls, ControlsState};
use crate::convo::phase::GenerationPhase;
use crate::convo::types::{ActivityFlags, ConversationEntry, Speaker};
use parking_lot::RwLock;
use tracing::{debug, warn};

struct Inner {
    entries: Vec<ConversationEntry>,
    phase: GenerationPhase,
    flags: ActivityFlags,
}

pub struct ConversationStore {
    inner: RwLock<Inner>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: Vec::new(),
                phase: GenerationPhase::Idle,
                flags: ActivityFlags::default(),
            }),
        }
    }

    /// Immutable snapshot of the full log
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.inner.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn phase(&self) -> GenerationPhase {
        self.inner.read().phase
    }

    pub fn flags(&self) -> ActivityFlags {
        self.inner.read().flags
    }

    /// Derive the control affordances for the current state
    pub fn controls(&self) -> ControlsState {
        let inner = self.inner.read();
        derive_controls(
            inner.flags.is_speaking,
            inner.flags.is_listening,
            inner.flags.is_hearing_speech,
            inner.flags.is_transcribing,
            inner.phase,
        )
    }

    /// Append a committed user utterance, returning its index
    pub fn add_user(&self, text: impl Into<String>) -> usize {
        let mut inner = self.inner.write();
        inner.entries.push(ConversationEntry::user(text));
        inner.entries.len() - 1
    }

    /// Append a user entry that only has a live caption so far
    pub fn add_user_streaming(&self, partial: impl Into<String>) -> usize {
        let mut inner = self.inner.write();
        inner.entries.push(ConversationEntry::user_streaming(partial));
        inner.entries.len() - 1
    }

    /// Append an assistant entry, returning its index
    pub fn add_assistant(&self, sentences: Vec<String>) -> usize {
        let mut inner = self.inner.write();
        inner.entries.push(ConversationEntry::assistant(sentences));
        inner.entries.len() - 1
    }

    pub fn add_system(&self, text: impl Into<String>) -> usize {
        let mut inner = self.inner.write();
        inner.entries.push(ConversationEntry::system(text));
        inner.entries.len() - 1
    }

    pub fn add_error(&self, text: impl Into<String>) -> usize {
        let mut inner = self.inner.write();
        inner.entries.push(ConversationEntry::error(text));
        inner.entries.len() - 1
    }

    /// Append new sentences to the assistant entry at `index`.
    ///
    /// A no-op when `index` does not refer to an assistant entry: that is the
    /// benign race between the fast-path and the full-response path, not
    /// corruption, so it is absorbed rather than surfaced.
    pub fn append_assistant_sentences(&self, index: usize, new_sentences: Vec<String>) -> bool {
        if new_sentences.is_empty() {
            return false;
        }
        let mut inner = self.inner.write();
        match inner.entries.get_mut(index) {
            Some(entry) if entry.is_assistant => {
                entry.sentences.extend(new_sentences);
                true
            }
            _ => {
                debug!(index, "append ignored, not an assistant entry");
                false
            }
        }
    }

    /// Number of sentences in the entry at `index`
    pub fn sentence_count(&self, index: usize) -> Option<usize> {
        self.inner
            .read()
            .entries
            .get(index)
            .map(|e| e.sentences.len())
    }

    /// Overwrite the live caption on the most recent still-streaming user
    /// entry. Does not commit the partial into `sentences`. Returns false if
    /// no such entry exists (completed entries are never touched).
    pub fn update_last_user_streaming_text(&self, partial: impl Into<String>) -> bool {
        let mut inner = self.inner.write();
        match inner
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.speaker == Speaker::You)
        {
            Some(entry) if entry.is_streaming_user() => {
                entry.streaming_text = Some(partial.into());
                true
            }
            _ => false,
        }
    }

    /// Replace the most recent user utterance with corrected text, clearing
    /// any live caption. Falls back to appending a fresh user entry when no
    /// user entry exists. Returns the index of the affected entry.
    pub fn replace_last_user(&self, text: impl Into<String>) -> usize {
        let text = text.into();
        let mut inner = self.inner.write();
        let position = inner
            .entries
            .iter()
            .rposition(|e| e.speaker == Speaker::You);
        match position {
            Some(index) => {
                let entry = &mut inner.entries[index];
                entry.sentences = vec![text];
                entry.streaming_text = None;
                index
            }
            None => {
                inner.entries.push(ConversationEntry::user(text));
                inner.entries.len() - 1
            }
        }
    }

    /// Remove all entries and return the phase to idle.
    ///
    /// Refused while any activity flag or a non-idle phase holds, since
    /// clearing mid-turn would corrupt in-flight state.
    pub fn clear(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.flags.any_active() || inner.phase.is_generating() {
            warn!(phase = %inner.phase, "clear refused while activity in progress");
            return false;
        }
        inner.entries.clear();
        true
    }

    /// Request a phase transition; illegal edges are ignored with a warning.
    pub fn set_phase(&self, next: GenerationPhase) -> bool {
        let mut inner = self.inner.write();
        if !inner.phase.can_transition_to(next) {
            warn!(from = %inner.phase, to = %next, "illegal phase transition ignored");
            return false;
        }
        if inner.phase != next {
            debug!(from = %inner.phase, to = %next, "phase transition");
        }
        inner.phase = next;
        true
    }

    pub fn set_speaking(&self, value: bool) {
        self.inner.write().flags.is_speaking = value;
    }

    pub fn set_listening(&self, value: bool) {
        self.inner.write().flags.is_listening = value;
    }

    pub fn set_hearing_speech(&self, value: bool) {
        self.inner.write().flags.is_hearing_speech = value;
    }

    pub fn set_transcribing(&self, value: bool) {
        self.inner.write().flags.is_transcribing = value;
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_snapshot() {
        let store = ConversationStore::new();
        store.add_user("hello there");
        store.add_assistant(vec!["General greeting, nice to meet you.".to_string()]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].speaker, Speaker::You);
        assert!(snapshot[1].is_assistant);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutations() {
        let store = ConversationStore::new();
        store.add_user("first");
        let snapshot = store.snapshot();
        store.add_user("second");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_append_to_assistant_entry() {
        let store = ConversationStore::new();
        let index = store.add_assistant(vec!["The first sentence of it.".to_string()]);
        assert!(store.append_assistant_sentences(index, vec!["And the second one too.".to_string()]));
        assert_eq!(store.sentence_count(index), Some(2));
    }

    #[test]
    fn test_append_to_non_assistant_is_noop() {
        let store = ConversationStore::new();
        let index = store.add_user("hello");
        let before = store.snapshot();
        assert!(!store.append_assistant_sentences(index, vec!["nope".to_string()]));
        assert!(!store.append_assistant_sentences(99, vec!["nope".to_string()]));
        let after = store.snapshot();
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].sentences, after[0].sentences);
    }

    #[test]
    fn test_streaming_caption_updates_only_live_entry() {
        let store = ConversationStore::new();
        assert!(!store.update_last_user_streaming_text("early"));

        store.add_user_streaming("so I was");
        assert!(store.update_last_user_streaming_text("so I was wondering"));
        assert_eq!(
            store.snapshot()[0].streaming_text.as_deref(),
            Some("so I was wondering")
        );

        // Committed entries are never touched
        store.replace_last_user("so I was wondering about this");
        assert!(!store.update_last_user_streaming_text("late"));
    }

    #[test]
    fn test_replace_last_user_falls_back_to_add() {
        let store = ConversationStore::new();
        let index = store.replace_last_user("brand new");
        assert_eq!(index, 0);
        assert_eq!(store.snapshot()[0].text(), "brand new");
    }

    #[test]
    fn test_replace_last_user_skips_assistant_tail() {
        let store = ConversationStore::new();
        store.add_user("original question");
        store.add_assistant(vec!["Some assistant answer text here.".to_string()]);
        let index = store.replace_last_user("corrected question");

        assert_eq!(index, 0);
        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].text(), "corrected question");
        assert!(snapshot[1].is_assistant);
    }

    #[test]
    fn test_clear_refused_while_active() {
        let store = ConversationStore::new();
        store.add_user("hello");

        store.set_listening(true);
        assert!(!store.clear());
        assert_eq!(store.len(), 1);

        store.set_listening(false);
        store.set_phase(GenerationPhase::GeneratingFirst);
        assert!(!store.clear());

        store.set_phase(GenerationPhase::Idle);
        assert!(store.clear());
        assert!(store.is_empty());
    }

    #[test]
    fn test_illegal_phase_transition_ignored() {
        let store = ConversationStore::new();
        assert!(!store.set_phase(GenerationPhase::GeneratingRemainder));
        assert_eq!(store.phase(), GenerationPhase::Idle);

        assert!(store.set_phase(GenerationPhase::GeneratingFirst));
        assert!(store.set_phase(GenerationPhase::GeneratingRemainder));
        assert!(store.set_phase(GenerationPhase::Idle));
    }

    #[test]
    fn test_controls_follow_flags() {
        let store = ConversationStore::new();
        assert!(store.controls().clear_enabled);

        store.set_transcribing(true);
        let controls = store.controls();
        assert!(!controls.clear_enabled);
        assert_eq!(controls.status_text, "Transcribing");
    }
}
