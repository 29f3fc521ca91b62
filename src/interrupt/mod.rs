//! Barge-in handling for completed assistant responses
//!
//! Separates a generation *finishing* from its *delivery*: when the user is
//! already talking over the tail end of a response, the finished text is
//! parked in a single pending slot instead of being committed to the log.
//! Delivery is deferred, never discarded by the guard itself; the pending
//! text flushes when the barge-in resolves or when the hold window expires.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a buffered response is held before flushing anyway
pub const DEFAULT_HOLD_WINDOW: Duration = Duration::from_millis(1500);

#[derive(Debug)]
struct PendingResponse {
    text: String,
    buffered_at: Instant,
}

/// Decides, at each assistant-response boundary, whether to deliver
/// immediately or buffer pending the barge-in window.
pub struct InterruptGuard {
    /// Mirror of the confirmed hearing-speech signal wired in by the host
    barge_in: Arc<AtomicBool>,
    /// At most one buffered response at a time; a second completed response
    /// replaces the pending one (newest wins)
    pending: Mutex<Option<PendingResponse>>,
    hold_window: Duration,
}

impl InterruptGuard {
    pub fn new(barge_in: Arc<AtomicBool>) -> Self {
        Self {
            barge_in,
            pending: Mutex::new(None),
            hold_window: DEFAULT_HOLD_WINDOW,
        }
    }

    pub fn with_hold_window(mut self, hold_window: Duration) -> Self {
        self.hold_window = hold_window;
        self
    }

    /// The shared barge-in flag, set by whoever observes hearing-speech
    pub fn barge_in_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.barge_in)
    }

    /// Gate a completed assistant response.
    ///
    /// Returns true when the response was buffered: the caller must skip
    /// delivery, grounding extraction, and the phase-to-idle transition for
    /// this call. A response completing while another is already pending
    /// replaces it; the superseded text is logged and dropped.
    pub fn maybe_hold_final_response(&self, text: &str) -> bool {
        if !self.barge_in.load(Ordering::SeqCst) {
            return false;
        }

        let mut pending = self.pending.lock();
        if let Some(previous) = pending.replace(PendingResponse {
            text: text.to_string(),
            buffered_at: Instant::now(),
        }) {
            warn!(
                superseded_chars = previous.text.len(),
                "replacing buffered response with newer one"
            );
        }
        debug!(chars = text.len(), "assistant response buffered for barge-in");
        true
    }

    /// Flush the pending response once the barge-in signal has dropped.
    pub fn take_if_resolved(&self) -> Option<String> {
        if self.barge_in.load(Ordering::SeqCst) {
            return None;
        }
        self.pending.lock().take().map(|p| {
            debug!("buffered response released, barge-in resolved");
            p.text
        })
    }

    /// Flush the pending response if it has been held past the window,
    /// regardless of the barge-in signal.
    pub fn take_if_expired(&self) -> Option<String> {
        let mut pending = self.pending.lock();
        let expired = matches!(
            pending.as_ref(),
            Some(p) if p.buffered_at.elapsed() >= self.hold_window
        );
        if !expired {
            return None;
        }
        debug!("buffered response released, hold window expired");
        pending.take().map(|p| p.text)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Drop the pending response, e.g. when a new user turn supersedes it.
    /// Returns the discarded text for logging.
    pub fn discard_pending(&self) -> Option<String> {
        self.pending.lock().take().map(|p| p.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_with_flag(hearing: bool) -> InterruptGuard {
        InterruptGuard::new(Arc::new(AtomicBool::new(hearing)))
    }

    #[test]
    fn test_delivers_immediately_without_barge_in() {
        let guard = guard_with_flag(false);
        assert!(!guard.maybe_hold_final_response("Sure, here is the answer."));
        assert!(!guard.has_pending());
    }

    #[test]
    fn test_buffers_while_hearing_speech() {
        let guard = guard_with_flag(true);
        assert!(guard.maybe_hold_final_response("Sure, here is the answer."));
        assert!(guard.has_pending());

        // Still held while the user keeps talking
        assert_eq!(guard.take_if_resolved(), None);
    }

    #[test]
    fn test_flushes_when_barge_in_resolves() {
        let flag = Arc::new(AtomicBool::new(true));
        let guard = InterruptGuard::new(Arc::clone(&flag));

        assert!(guard.maybe_hold_final_response("Held response text."));
        flag.store(false, Ordering::SeqCst);

        assert_eq!(guard.take_if_resolved(), Some("Held response text.".to_string()));
        assert!(!guard.has_pending());
        // Second take is empty: consume-once semantics
        assert_eq!(guard.take_if_resolved(), None);
    }

    #[test]
    fn test_second_response_replaces_pending() {
        let guard = guard_with_flag(true);
        assert!(guard.maybe_hold_final_response("First finished response."));
        assert!(guard.maybe_hold_final_response("Second finished response."));

        guard.barge_in_flag().store(false, Ordering::SeqCst);
        assert_eq!(
            guard.take_if_resolved(),
            Some("Second finished response.".to_string())
        );
    }

    #[test]
    fn test_expiry_flush_ignores_barge_in_signal() {
        let guard = guard_with_flag(true).with_hold_window(Duration::from_millis(10));
        assert!(guard.maybe_hold_final_response("Expiring response."));

        assert_eq!(guard.take_if_expired(), None);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(guard.take_if_expired(), Some("Expiring response.".to_string()));
    }

    #[test]
    fn test_discard_pending() {
        let guard = guard_with_flag(true);
        assert!(guard.maybe_hold_final_response("Superseded by a new turn."));
        assert_eq!(
            guard.discard_pending(),
            Some("Superseded by a new turn.".to_string())
        );
        assert!(!guard.has_pending());
    }
}
