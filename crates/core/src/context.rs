//! Append-only turn log shared between the orchestrator and live viewers.
//!
//! The orchestrator is the single writer. Readers obtain a [`ContextReader`]
//! and observe the log through the same `RwLock`, so a reader never sees a
//! half-appended turn.

use crate::error::DebateError;
use crate::session::{Role, Turn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered log of every turn in a session.
#[derive(Debug, Default)]
pub struct ContextStore {
    turns: Arc<RwLock<Vec<Turn>>>,
}

/// Read-only handle onto a [`ContextStore`].
#[derive(Debug, Clone)]
pub struct ContextReader {
    turns: Arc<RwLock<Vec<Turn>>>,
}

/// Index of the `(round, role)` slot in the log.
fn slot_index(round: u32, role: Role) -> usize {
    (round.saturating_sub(1) as usize) * 2 + role.index()
}

/// The `(round, role)` slot that the next appended turn must occupy.
fn slot_for_len(len: usize) -> (u32, Role) {
    let round = (len / 2) as u32 + 1;
    let role = if len % 2 == 0 { Role::A } else { Role::B };
    (round, role)
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `turn`, failing with `OutOfOrderTurn` unless it fills the next slot.
    pub async fn append(&self, turn: Turn) -> Result<(), DebateError> {
        let mut turns = self.turns.write().await;
        let (expected_round, expected_role) = slot_for_len(turns.len());
        if turn.round != expected_round || turn.role != expected_role {
            return Err(DebateError::OutOfOrderTurn {
                expected_round,
                expected_role,
                round: turn.round,
                role: turn.role,
            });
        }
        turns.push(turn);
        Ok(())
    }

    /// Every turn before the `(round, role)` slot, oldest first.
    ///
    /// This is the full history, not a window; truncation is left to the
    /// participant.
    pub async fn context_for(&self, role: Role, round: u32) -> Vec<Turn> {
        context_before(&*self.turns.read().await, role, round)
    }

    /// The slot the next turn must fill.
    pub async fn next_slot(&self) -> (u32, Role) {
        slot_for_len(self.turns.read().await.len())
    }

    pub async fn len(&self) -> usize {
        self.turns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.read().await.is_empty()
    }

    /// Both turns of `round`, once role B has spoken.
    pub async fn round_pair(&self, round: u32) -> Option<(Turn, Turn)> {
        let turns = self.turns.read().await;
        let a = turns.get(slot_index(round, Role::A))?.clone();
        let b = turns.get(slot_index(round, Role::B))?.clone();
        Some((a, b))
    }

    /// A copy of the whole log.
    pub async fn snapshot(&self) -> Vec<Turn> {
        self.turns.read().await.clone()
    }

    /// A handle that can read but never append.
    pub fn reader(&self) -> ContextReader {
        ContextReader {
            turns: Arc::clone(&self.turns),
        }
    }
}

impl ContextReader {
    pub async fn snapshot(&self) -> Vec<Turn> {
        self.turns.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.turns.read().await.len()
    }

    pub async fn latest(&self) -> Option<Turn> {
        self.turns.read().await.last().cloned()
    }

    pub async fn context_for(&self, role: Role, round: u32) -> Vec<Turn> {
        context_before(&*self.turns.read().await, role, round)
    }
}

fn context_before(turns: &[Turn], role: Role, round: u32) -> Vec<Turn> {
    let end = slot_index(round, role).min(turns.len());
    turns[..end].to_vec()
}

/// A short digest of the debate so far: per speaker, the number of arguments
/// made and the opening sentence of the latest one.
pub fn summarize(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "No arguments yet.".to_string();
    }

    // Keyed by role so the summary order is stable.
    let mut by_role: BTreeMap<usize, (&str, Vec<&Turn>)> = BTreeMap::new();
    for turn in turns {
        by_role
            .entry(turn.role.index())
            .or_insert_with(|| (turn.speaker.as_str(), Vec::new()))
            .1
            .push(turn);
    }

    let mut lines = vec![format!("Debate summary after {} turns:", turns.len())];
    for (speaker, spoken) in by_role.values() {
        lines.push(format!("- {speaker} has made {} arguments", spoken.len()));
        if let Some(latest) = spoken.last() {
            lines.push(format!("  Latest: {}", key_point(&latest.text)));
        }
    }
    lines.join("\n")
}

/// First sentence of `text`, capped at 100 characters.
fn key_point(text: &str) -> String {
    let first = text.split('.').next().unwrap_or_default().trim();
    let mut point: String = first.chars().take(100).collect();
    point.push('.');
    point
}
