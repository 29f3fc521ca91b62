//! Conversation state: data model, generation phase, store, and derived controls

pub mod controls;
pub mod phase;
pub mod store;
pub mod types;

pub use controls::{derive_controls, ControlsState};
pub use phase::GenerationPhase;
pub use store::ConversationStore;
pub use types::{ActivityFlags, ConversationEntry, Speaker};
