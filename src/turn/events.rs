//! Turn events, delivered as a tagged enum over one ordered channel per turn
//!
//! The channel enforces the ordering invariant instead of convention: within
//! a turn, `FirstSentence` precedes any `RemainingSentences`, which precede
//! the terminal `FinalResponse` or `Error`, which precedes `Finish`.
//! `System` may appear at any point before `Finish`.

/// Events emitted by a turn worker
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// First complete sentence of a streamed response (latency fast path)
    FirstSentence(String),

    /// Newly completed sentences beyond what was already delivered for this
    /// turn; consumers apply them as an append, never a replace
    RemainingSentences(Vec<String>),

    /// Terminal content-bearing event carrying the full response text
    FinalResponse(String),

    /// Turn-adjacent informational message, e.g. grounding source summaries
    System(String),

    /// Terminal failure for this turn
    Error(String),

    /// Always the last event of a turn, success or failure, so per-turn
    /// timing and holder state is released on every path
    Finish,
}

impl TurnEvent {
    /// Whether this event carries conversation content
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            TurnEvent::FirstSentence(_)
                | TurnEvent::RemainingSentences(_)
                | TurnEvent::FinalResponse(_)
        )
    }
}
