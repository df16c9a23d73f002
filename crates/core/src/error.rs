//! Error taxonomy for a debate session.
//!
//! Only `InvalidTopic` is returned before a session starts. Every other variant
//! is raised inside the state machine and either aborts the session (keeping
//! the partial transcript) or, for `Scoring`, is recorded and swallowed.

use crate::session::Role;
use serde::{Deserialize, Serialize};

/// Errors raised while validating, running or persisting a debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DebateError {
    /// The topic failed structural validation. Never enters the state machine.
    #[error("Invalid topic: {reason}")]
    InvalidTopic { reason: String },

    /// A turn was appended to the context store outside its slot.
    #[error(
        "Turn out of order: expected round {expected_round} {expected_role}, got round {round} {role}"
    )]
    OutOfOrderTurn {
        expected_round: u32,
        expected_role: Role,
        round: u32,
        role: Role,
    },

    /// A participant failed or timed out. Fatal to the session.
    #[error("Generation failed in round {round} for {role}: {reason}")]
    Generation {
        round: u32,
        role: Role,
        reason: String,
    },

    /// The judge failed or timed out. Recorded as a missing score.
    #[error("Scoring failed in round {round}: {reason}")]
    Scoring { round: u32, reason: String },

    /// The transcript could not be handed to the sink.
    #[error("Transcript sink failed: {reason}")]
    Sink { reason: String },

    /// The session was cancelled at a suspension point.
    #[error("Debate cancelled in round {round}")]
    Cancelled { round: u32, role: Option<Role> },

    /// The orchestrator attempted an edge missing from the state graph.
    #[error("Illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

impl DebateError {
    /// Builds an `InvalidTopic` error from any displayable reason.
    pub fn invalid_topic(reason: impl Into<String>) -> Self {
        Self::InvalidTopic {
            reason: reason.into(),
        }
    }

    /// The round the error occurred in, when it happened inside a round.
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::OutOfOrderTurn { round, .. }
            | Self::Generation { round, .. }
            | Self::Scoring { round, .. }
            | Self::Cancelled { round, .. } => Some(*round),
            _ => None,
        }
    }

    /// The role whose turn was in flight, when the error is tied to one.
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::OutOfOrderTurn { role, .. } | Self::Generation { role, .. } => Some(*role),
            Self::Cancelled { role, .. } => *role,
            _ => None,
        }
    }
}
