//! Debate data model: roles, personas, turns, scores and the session aggregate.
//!
//! A [`DebateSession`] is owned by exactly one orchestrator run. Freezing it
//! consumes the session and yields an immutable [`Transcript`].

use crate::coherence::CoherenceNote;
use crate::context::ContextStore;
use crate::error::DebateError;
use crate::scoring::{ScoreSummary, Verdict};
use crate::state_machine::TransitionRecord;
use crate::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of rounds in every debate.
pub const ROUNDS: u32 = 8;

/// Upper bound of every score dimension.
pub const MAX_SCORE: f64 = 10.0;

/// One of the two fixed debating identities. `A` always speaks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    A,
    B,
}

impl Role {
    pub fn opponent(self) -> Self {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    /// Position of this role inside a round (A = 0, B = 1).
    pub fn index(self) -> usize {
        match self {
            Role::A => 0,
            Role::B => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::A => write!(f, "role A"),
            Role::B => write!(f, "role B"),
        }
    }
}

/// The character a participant plays for the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    /// Short description used in prompts, e.g. "research scientist".
    pub role: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub expertise: String,
}

impl Persona {
    pub fn scientist() -> Self {
        Self {
            id: "agent_a".to_string(),
            name: "Scientist".to_string(),
            role: "research scientist".to_string(),
            style: "Analytical and evidence-driven; cites studies and data.".to_string(),
            expertise: "empirical research and risk assessment".to_string(),
        }
    }

    pub fn philosopher() -> Self {
        Self {
            id: "agent_b".to_string(),
            name: "Philosopher".to_string(),
            role: "moral philosopher".to_string(),
            style: "Reflective and probing; questions assumptions and values.".to_string(),
            expertise: "ethics, epistemology and political philosophy".to_string(),
        }
    }
}

/// The pair of personas, keyed by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personas {
    #[serde(rename = "agent_a")]
    pub a: Persona,
    #[serde(rename = "agent_b")]
    pub b: Persona,
}

impl Personas {
    pub fn get(&self, role: Role) -> &Persona {
        match role {
            Role::A => &self.a,
            Role::B => &self.b,
        }
    }
}

impl Default for Personas {
    fn default() -> Self {
        Self {
            a: Persona::scientist(),
            b: Persona::philosopher(),
        }
    }
}

/// A single argument, immutable once appended to the context store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub round: u32,
    pub role: Role,
    /// Persona name of the speaker.
    pub speaker: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(round: u32, role: Role, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            round,
            role,
            speaker: speaker.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The judge's evaluation of one round, each dimension in `0.0..=10.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub round: u32,
    pub coherence: f64,
    pub engagement: f64,
    pub argument_strength: f64,
}

impl Score {
    /// Builds a score, rejecting dimensions outside `0.0..=10.0` or NaN.
    pub fn new(
        round: u32,
        coherence: f64,
        engagement: f64,
        argument_strength: f64,
    ) -> Result<Self, DebateError> {
        let score = Self {
            round,
            coherence,
            engagement,
            argument_strength,
        };
        score.check(round)?;
        Ok(score)
    }

    /// Verifies the score belongs to `round` and every dimension is in range.
    pub fn check(&self, round: u32) -> Result<(), DebateError> {
        if self.round != round {
            return Err(DebateError::Scoring {
                round,
                reason: format!("score is labelled round {}", self.round),
            });
        }
        for (name, value) in [
            ("coherence", self.coherence),
            ("engagement", self.engagement),
            ("argument_strength", self.argument_strength),
        ] {
            if !(0.0..=MAX_SCORE).contains(&value) {
                return Err(DebateError::Scoring {
                    round,
                    reason: format!("{name} {value} is outside 0..={MAX_SCORE}"),
                });
            }
        }
        Ok(())
    }
}

/// Terminal status of a frozen session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Aborted { error: DebateError },
}

/// Aggregate root for a single debate run.
#[derive(Debug)]
pub struct DebateSession {
    id: Uuid,
    topic: Topic,
    seed: Option<u64>,
    personas: Personas,
    started_at: DateTime<Utc>,
    context: ContextStore,
    scores: Vec<Option<Score>>,
    round: u32,
    notes: Vec<CoherenceNote>,
}

impl DebateSession {
    pub fn new(topic: Topic, personas: Personas, seed: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            seed,
            personas,
            started_at: Utc::now(),
            context: ContextStore::new(),
            scores: Vec::with_capacity(ROUNDS as usize),
            round: 0,
            notes: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn personas(&self) -> &Personas {
        &self.personas
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// The round currently in progress (0 before the first round).
    pub fn current_round(&self) -> u32 {
        self.round
    }

    /// Rounds whose scoring step has finished, successfully or not.
    pub fn completed_rounds(&self) -> u32 {
        self.scores.len() as u32
    }

    pub fn scores(&self) -> &[Option<Score>] {
        &self.scores
    }

    /// Moves the round counter forward by one, never past [`ROUNDS`].
    pub(crate) fn begin_next_round(&mut self) -> Option<u32> {
        if self.round >= ROUNDS {
            return None;
        }
        self.round += 1;
        Some(self.round)
    }

    /// Closes the current round with its score, `None` when scoring failed.
    pub(crate) fn close_round(&mut self, score: Option<Score>) {
        debug_assert_eq!(self.scores.len() as u32 + 1, self.round);
        self.scores.push(score);
    }

    pub(crate) fn add_note(&mut self, note: CoherenceNote) {
        self.notes.push(note);
    }

    /// Consumes the session and produces the immutable transcript. Only a
    /// completed debate gets a verdict.
    pub(crate) async fn freeze(
        self,
        status: SessionStatus,
        summary: ScoreSummary,
        transitions: Vec<TransitionRecord>,
    ) -> Transcript {
        let turns = self.context.snapshot().await;
        let verdict = matches!(status, SessionStatus::Completed)
            .then(|| Verdict::decide(&turns, &self.personas));
        Transcript {
            id: self.id,
            topic: self.topic,
            seed: self.seed,
            personas: self.personas,
            status,
            rounds_completed: self.scores.len() as u32,
            turns,
            scores: self.scores,
            summary,
            verdict,
            notes: self.notes,
            transitions,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// The frozen record of a completed or aborted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub topic: Topic,
    pub seed: Option<u64>,
    pub personas: Personas,
    pub status: SessionStatus,
    pub rounds_completed: u32,
    pub turns: Vec<Turn>,
    /// One entry per completed round; `None` where scoring failed.
    pub scores: Vec<Option<Score>>,
    pub summary: ScoreSummary,
    #[serde(default)]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub notes: Vec<CoherenceNote>,
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Transcript {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, SessionStatus::Completed)
    }

    /// The error that aborted the session, if any.
    pub fn failure(&self) -> Option<&DebateError> {
        match &self.status {
            SessionStatus::Completed => None,
            SessionStatus::Aborted { error } => Some(error),
        }
    }

    pub fn valid_scores(&self) -> impl Iterator<Item = &Score> {
        self.scores.iter().flatten()
    }

    /// Rounds (1-based) whose score is missing.
    pub fn missing_score_rounds(&self) -> Vec<u32> {
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    pub fn turns_for(&self, role: Role) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(move |t| t.role == role)
    }
}
