pub mod coherence;
pub mod context;
pub mod error;
pub mod llm_client;
pub mod orchestrator;
pub mod participant;
pub mod scoring;
pub mod session;
pub mod sink;
pub mod state_machine;
pub mod topic;

pub use error::DebateError;
pub use orchestrator::{DebateEvent, DebateOutcome, OrchestratorConfig, RoundOrchestrator};
pub use session::{Persona, Personas, ROUNDS, Role, Score, SessionStatus, Transcript, Turn};
pub use topic::Topic;
