//! Debate State Machine: explicit states and legal transition guards.
//!
//! Every session starts at `NotStarted` and ends at either `Completed` or
//! `Aborted`. The orchestrator calls [`StateMachine::advance`] to move between
//! states; each call checks the edge against the transition table and records
//! it, so the transcript carries the exact path a session took.

use crate::error::DebateError;
use crate::session::ROUNDS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// The set of orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DebateState {
    NotStarted,
    /// Checking the raw topic.
    Validating,
    /// Waiting on role A's argument for `round`.
    AwaitingRoleA { round: u32 },
    /// Waiting on role B's argument for `round`; A has already spoken.
    AwaitingRoleB { round: u32 },
    /// Waiting on the judge for `round`.
    Scoring { round: u32 },
    /// Freezing the session and handing it to the sink.
    Finalizing,
    /// All rounds played; terminal.
    Completed,
    /// Stopped by a fatal error or cancellation; terminal.
    Aborted,
}

impl DebateState {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// The round this state belongs to, if any.
    pub fn round(self) -> Option<u32> {
        match self {
            Self::AwaitingRoleA { round }
            | Self::AwaitingRoleB { round }
            | Self::Scoring { round } => Some(round),
            _ => None,
        }
    }
}

impl fmt::Display for DebateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::Validating => write!(f, "Validating"),
            Self::AwaitingRoleA { round } => write!(f, "AwaitingRoleA({round})"),
            Self::AwaitingRoleB { round } => write!(f, "AwaitingRoleB({round})"),
            Self::Scoring { round } => write!(f, "Scoring({round})"),
            Self::Finalizing => write!(f, "Finalizing"),
            Self::Completed => write!(f, "Completed"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Legal transitions between debate states.
///
/// ```text
/// NotStarted       -> Validating
/// Validating       -> AwaitingRoleA(1)
/// AwaitingRoleA(r) -> AwaitingRoleB(r)
/// AwaitingRoleB(r) -> Scoring(r)
/// Scoring(r)       -> AwaitingRoleA(r + 1)    when r < ROUNDS
/// Scoring(ROUNDS)  -> Finalizing
/// Finalizing       -> Completed
/// any non-terminal -> Aborted
/// ```
fn is_legal_transition(from: DebateState, to: DebateState) -> bool {
    use DebateState::*;

    if to == Aborted && !from.is_terminal() {
        return true;
    }

    match (from, to) {
        (NotStarted, Validating) => true,
        (Validating, AwaitingRoleA { round }) => round == 1,
        (AwaitingRoleA { round: r }, AwaitingRoleB { round }) => round == r,
        (AwaitingRoleB { round: r }, Scoring { round }) => round == r,
        (Scoring { round: r }, AwaitingRoleA { round }) => r < ROUNDS && round == r + 1,
        (Scoring { round }, Finalizing) => round == ROUNDS,
        (Finalizing, Completed) => true,
        _ => false,
    }
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: DebateState,
    pub to: DebateState,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Tracks the current state, enforces legal transitions, and keeps the log.
#[derive(Debug)]
pub struct StateMachine {
    current: DebateState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    /// Create a new state machine starting at `NotStarted`.
    pub fn new() -> Self {
        Self {
            current: DebateState::NotStarted,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> DebateState {
        self.current
    }

    /// Attempt to advance to the next state.
    pub fn advance(&mut self, to: DebateState, reason: Option<&str>) -> Result<(), DebateError> {
        if !is_legal_transition(self.current, to) {
            return Err(DebateError::IllegalTransition {
                from: self.current.to_string(),
                to: to.to_string(),
            });
        }

        tracing::debug!(from = %self.current, to = %to, "State transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Transition to `Aborted` from any non-terminal state.
    pub fn abort(&mut self, reason: &str) -> Result<(), DebateError> {
        self.advance(DebateState::Aborted, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
