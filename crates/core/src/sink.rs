//! Transcript Persistence
//!
//! The orchestrator hands every frozen transcript, completed or aborted, to a
//! [`TranscriptSink`]. The sink decides the storage format; the core never
//! touches the filesystem itself.

use crate::session::{Role, SessionStatus, Transcript};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

/// Defines the contract for any service that stores finished transcripts.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn persist(&self, transcript: &Transcript) -> Result<()>;
}

/// Writes the transcript as pretty-printed JSON, plus a plain-text rendering
/// next to it with a `.txt` extension.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A sink writing to `<dir>/debate_<YYYYmmdd_HHMMSS>.json`.
    pub fn timestamped(dir: impl AsRef<Path>) -> Self {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        Self::new(dir.as_ref().join(format!("debate_{stamp}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text_path(&self) -> PathBuf {
        self.path.with_extension("txt")
    }

    /// Reads back a transcript written by this sink.
    pub async fn load(path: impl AsRef<Path>) -> Result<Transcript> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse transcript {}", path.display()))
    }
}

#[async_trait]
impl TranscriptSink for JsonFileSink {
    async fn persist(&self, transcript: &Transcript) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(transcript)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        let text_path = self.text_path();
        tokio::fs::write(&text_path, render_text(transcript))
            .await
            .with_context(|| format!("Failed to write {}", text_path.display()))?;

        info!(
            json = %self.path.display(),
            text = %text_path.display(),
            "Transcript written"
        );
        Ok(())
    }
}

/// Keeps every persisted transcript in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    transcripts: Mutex<Vec<Transcript>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transcripts(&self) -> Vec<Transcript> {
        self.transcripts.lock().await.clone()
    }

    pub async fn last(&self) -> Option<Transcript> {
        self.transcripts.lock().await.last().cloned()
    }
}

#[async_trait]
impl TranscriptSink for MemorySink {
    async fn persist(&self, transcript: &Transcript) -> Result<()> {
        self.transcripts.lock().await.push(transcript.clone());
        Ok(())
    }
}

/// Human-readable rendering of a transcript.
pub fn render_text(transcript: &Transcript) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "Debate {}", transcript.id);
    let _ = writeln!(out, "Topic: {}", transcript.topic);
    let _ = writeln!(
        out,
        "Participants: {} (A) vs {} (B)",
        transcript.personas.a.name, transcript.personas.b.name
    );
    if let Some(seed) = transcript.seed {
        let _ = writeln!(out, "Seed: {seed}");
    }
    match &transcript.status {
        SessionStatus::Completed => {
            let _ = writeln!(out, "Status: completed ({} rounds)", transcript.rounds_completed);
        }
        SessionStatus::Aborted { error } => {
            let _ = writeln!(out, "Status: aborted ({error})");
        }
    }
    let _ = writeln!(out, "Started: {}", transcript.started_at.to_rfc3339());
    let _ = writeln!(out, "Finished: {}", transcript.finished_at.to_rfc3339());

    let _ = writeln!(out, "\nFULL TRANSCRIPT:");
    for turn in &transcript.turns {
        let _ = writeln!(out, "\n[Round {}] {}:", turn.round, turn.speaker);
        let _ = writeln!(out, "{}", turn.text);
        let _ = writeln!(out, "({})", turn.timestamp.to_rfc3339());
    }

    let _ = writeln!(out, "\nSCORES:");
    for (i, score) in transcript.scores.iter().enumerate() {
        match score {
            Some(s) => {
                let _ = writeln!(
                    out,
                    "Round {}: coherence {:.2}, engagement {:.2}, strength {:.2}",
                    i + 1,
                    s.coherence,
                    s.engagement,
                    s.argument_strength
                );
            }
            None => {
                let _ = writeln!(out, "Round {}: not scored", i + 1);
            }
        }
    }
    if let Some(agg) = &transcript.summary.aggregate {
        let _ = writeln!(
            out,
            "Overall ({}): coherence {:.2}, engagement {:.2}, strength {:.2}",
            transcript.summary.aggregator, agg.coherence, agg.engagement, agg.argument_strength
        );
    }

    if let Some(verdict) = &transcript.verdict {
        let _ = writeln!(out, "\nVERDICT:");
        let winner = verdict
            .winner
            .map_or("none (tie)", |role| transcript.personas.get(role).name.as_str());
        let _ = writeln!(out, "Winner: {winner}");
        for role in [Role::A, Role::B] {
            let scores = verdict.for_role(role);
            let _ = writeln!(
                out,
                "{}: coherence {:.2}, engagement {:.2}, strength {:.2}, total {:.2}",
                transcript.personas.get(role).name,
                scores.coherence,
                scores.engagement,
                scores.argument_strength,
                scores.total()
            );
        }
        let _ = writeln!(out, "{}", verdict.justification);
    }

    if !transcript.notes.is_empty() {
        let _ = writeln!(out, "\nCOHERENCE NOTES:");
        for note in &transcript.notes {
            let _ = writeln!(out, "Round {} {}: {}", note.round, note.role, note.issue);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::MeanAggregator;
    use crate::scoring::ScoreAggregator;
    use crate::session::{DebateSession, Personas, Score, Turn};
    use crate::topic::Topic;

    /// Parses back one ulp off without exact float parsing.
    const AWKWARD: f64 = 0.00010000900081007291;

    async fn transcript(status: SessionStatus) -> Transcript {
        let topic = Topic::validate("Should AI be regulated like medicine?").unwrap();
        let mut session = DebateSession::new(topic, Personas::default(), Some(11));
        let round = session.begin_next_round().unwrap();
        session
            .context()
            .append(Turn::new(round, Role::A, "Scientist", "Research shows trials work."))
            .await
            .unwrap();
        session
            .context()
            .append(Turn::new(round, Role::B, "Philosopher", "Software is not a drug."))
            .await
            .unwrap();
        let score = Score::new(round, AWKWARD, 5.0, 7.3).unwrap();
        session.close_round(Some(score));
        let summary = MeanAggregator.summarize(session.scores());
        session.freeze(status, summary, Vec::new()).await
    }

    #[tokio::test]
    async fn test_json_sink_preserves_scores_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("debate.json"));
        let original = transcript(SessionStatus::Completed).await;

        sink.persist(&original).await.unwrap();
        let loaded = JsonFileSink::load(sink.path()).await.unwrap();

        assert_eq!(
            loaded.scores[0].map(|s| s.coherence),
            Some(AWKWARD)
        );
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_render_text_includes_verdict_for_completed_debates() {
        let completed = transcript(SessionStatus::Completed).await;
        let text = render_text(&completed);
        assert!(text.contains("VERDICT:"));
        assert!(text.contains("Winner: "));
        assert!(text.contains("Philosopher: coherence"));

        let aborted = transcript(SessionStatus::Aborted {
            error: crate::DebateError::Cancelled {
                round: 1,
                role: None,
            },
        })
        .await;
        assert!(aborted.verdict.is_none());
        assert!(!render_text(&aborted).contains("VERDICT:"));
    }
}
