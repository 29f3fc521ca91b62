//! Generation phase state machine
//!
//! The phase gates which UI actions are valid at any moment. Transitions are
//! enumerated explicitly; requests that do not match a legal edge are ignored
//! by the store rather than trusted.

use serde::{Deserialize, Serialize};

/// Coarse-grained generation state, one value held process-wide at a time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationPhase {
    /// No turn in progress
    #[default]
    Idle,
    /// Waiting for the first complete sentence from the model
    GeneratingFirst,
    /// First sentence delivered, remainder still streaming
    GeneratingRemainder,
    /// Non-streaming turn, e.g. a search-grounded request
    SingleShotGenerating,
}

impl GenerationPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, GenerationPhase::Idle)
    }

    pub fn is_generating(&self) -> bool {
        !self.is_idle()
    }

    /// Whether moving to `next` follows a legal edge.
    ///
    /// Legal edges: Idle -> GeneratingFirst -> GeneratingRemainder -> Idle,
    /// Idle -> SingleShotGenerating -> Idle, and any state back to Idle
    /// (error, abort, clear). Self-transitions are allowed as no-ops.
    pub fn can_transition_to(&self, next: GenerationPhase) -> bool {
        use GenerationPhase::*;
        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (_, Idle)
                | (Idle, GeneratingFirst)
                | (Idle, SingleShotGenerating)
                | (GeneratingFirst, GeneratingRemainder)
        )
    }
}

impl std::fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationPhase::Idle => write!(f, "Idle"),
            GenerationPhase::GeneratingFirst => write!(f, "GeneratingFirst"),
            GenerationPhase::GeneratingRemainder => write!(f, "GeneratingRemainder"),
            GenerationPhase::SingleShotGenerating => write!(f, "SingleShotGenerating"),
        }
    }
}
