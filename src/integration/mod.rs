//! Integration layer: session configuration and orchestrator wiring

pub mod config;
pub mod orchestrator;

pub use config::SessionConfig;
pub use orchestrator::{Orchestrator, OrchestratorCommand, OrchestratorEvent, OrchestratorHandle};
