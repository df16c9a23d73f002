//! Round Scoring
//!
//! A judge scores each round on three dimensions (coherence, engagement and
//! argument strength), each on a `0..=10` scale. The three sub-scores are the
//! authoritative record; collapsing them into summary figures is delegated to
//! a pluggable [`ScoreAggregator`].
//!
//! Once the debate is over, a [`Verdict`] scores each role over its own turns
//! and names the winner.

use crate::llm_client::{CompletionOptions, LLMClient};
use crate::session::{MAX_SCORE, Personas, Role, Score, Turn};
use crate::topic::Topic;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Defines the contract for any service that can judge a round.
#[async_trait]
pub trait ScoringPort: Send + Sync {
    /// Scores the round made of `turn_a` and `turn_b`.
    ///
    /// The returned score must carry the round number of the two turns.
    async fn score(&self, topic: &Topic, turn_a: &Turn, turn_b: &Turn) -> Result<Score>;
}

const EVIDENCE_MARKERS: &[&str] = &[
    "research",
    "studies",
    "data",
    "evidence",
    "facts",
    "historically",
    "proven",
    "demonstrates",
    "shows",
];

const REASONING_MARKERS: &[&str] = &[
    "therefore",
    "because",
    "thus",
    "consequently",
    "implies",
    "suggests",
    "indicates",
    "means",
];

/// Shared words between the two arguments that count as full engagement.
const ENGAGEMENT_OVERLAP: usize = 6;

/// A deterministic, offline judge built from simple text heuristics.
///
/// * coherence: mean of a length score (50 to 300 characters is ideal) and a
///   variety score (the two arguments should not open the same way);
/// * engagement: how many words role B shares with role A, saturating at six;
/// * argument strength: density of evidence and reasoning markers.
#[derive(Debug, Default, Clone)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    pub fn new() -> Self {
        Self
    }

    fn length_score(chars: usize) -> f64 {
        match chars {
            50..=300 => 1.0,
            0..50 => 0.5,
            _ => 0.8,
        }
    }

    fn coherence(turn_a: &Turn, turn_b: &Turn) -> f64 {
        let length = (Self::length_score(turn_a.text.chars().count())
            + Self::length_score(turn_b.text.chars().count()))
            / 2.0;
        let start = |t: &Turn| t.text.chars().take(20).collect::<String>();
        let variety = if start(turn_a) == start(turn_b) {
            0.5
        } else {
            1.0
        };
        (length + variety) / 2.0
    }

    fn engagement(turn_a: &Turn, turn_b: &Turn) -> f64 {
        let shared = shared_words(turn_a, turn_b);
        (shared as f64 / ENGAGEMENT_OVERLAP as f64).min(1.0)
    }

    fn strength(turn_a: &Turn, turn_b: &Turn) -> f64 {
        let count = |markers: &[&str]| -> usize {
            [turn_a, turn_b]
                .iter()
                .map(|t| {
                    let lower = t.text.to_lowercase();
                    markers.iter().filter(|m| lower.contains(*m)).count()
                })
                .sum()
        };
        // Two markers of each kind per argument saturates the dimension.
        let max_possible = 4.0;
        let evidence = (count(EVIDENCE_MARKERS) as f64 / max_possible).min(1.0);
        let reasoning = (count(REASONING_MARKERS) as f64 / max_possible).min(1.0);
        (evidence + reasoning) / 2.0
    }

    /// Scores one role over all of its own turns, each dimension on `0..=10`.
    ///
    /// A role that never spoke gets zero coherence and strength; engagement
    /// is neutral (5) when either side has no turns.
    pub fn role_scores(turns: &[Turn], role: Role) -> DimensionScores {
        let own: Vec<&Turn> = turns.iter().filter(|t| t.role == role).collect();
        let other: Vec<&Turn> = turns.iter().filter(|t| t.role != role).collect();
        let n = own.len() as f64;

        let coherence = if own.is_empty() {
            0.0
        } else {
            let total_chars: usize = own.iter().map(|t| t.text.chars().count()).sum();
            let length = Self::length_score(total_chars / own.len());
            let starts: HashSet<String> = own
                .iter()
                .map(|t| t.text.chars().take(20).collect())
                .collect();
            let variety = (starts.len() as f64 / n).min(1.0);
            (length + variety) / 2.0
        };

        // Each turn is paired with the opponent turn of the same round.
        let engagement = if own.is_empty() || other.is_empty() {
            0.5
        } else {
            let engaged = own
                .iter()
                .zip(&other)
                .filter(|(mine, theirs)| shared_words(mine, theirs) >= ENGAGEMENT_OVERLAP)
                .count();
            engaged as f64 / n
        };

        let strength = if own.is_empty() {
            0.0
        } else {
            let count = |markers: &[&str]| -> usize {
                own.iter()
                    .map(|t| {
                        let lower = t.text.to_lowercase();
                        markers.iter().filter(|m| lower.contains(*m)).count()
                    })
                    .sum()
            };
            let max_possible = n * 2.0;
            let evidence = (count(EVIDENCE_MARKERS) as f64 / max_possible).min(1.0);
            let reasoning = (count(REASONING_MARKERS) as f64 / max_possible).min(1.0);
            (evidence + reasoning) / 2.0
        };

        DimensionScores {
            coherence: coherence * MAX_SCORE,
            engagement: engagement * MAX_SCORE,
            argument_strength: strength * MAX_SCORE,
        }
    }
}

fn shared_words(turn_a: &Turn, turn_b: &Turn) -> usize {
    let words = |t: &Turn| -> HashSet<String> {
        t.text.split_whitespace().map(str::to_lowercase).collect()
    };
    words(turn_a).intersection(&words(turn_b)).count()
}

#[async_trait]
impl ScoringPort for HeuristicJudge {
    async fn score(&self, _topic: &Topic, turn_a: &Turn, turn_b: &Turn) -> Result<Score> {
        anyhow::ensure!(
            turn_a.round == turn_b.round,
            "turns belong to different rounds ({} and {})",
            turn_a.round,
            turn_b.round
        );
        let score = Score::new(
            turn_a.round,
            Self::coherence(turn_a, turn_b) * MAX_SCORE,
            Self::engagement(turn_a, turn_b) * MAX_SCORE,
            Self::strength(turn_a, turn_b) * MAX_SCORE,
        )?;
        Ok(score)
    }
}

/// The JSON object the LLM judge is asked to return.
#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    coherence: f64,
    engagement: f64,
    argument_strength: f64,
}

/// A `ScoringPort` that asks a chat model for the three sub-scores.
pub struct LlmJudge {
    client: Arc<dyn LLMClient>,
    prompts: HashMap<String, String>,
}

const JUDGE_PROMPT_KEY: &str = "judge_round";
const JUDGE_SYSTEM_PROMPT: &str =
    "You are an impartial debate judge. Reply with a single JSON object and nothing else.";

impl LlmJudge {
    /// `prompts` must contain a `"judge_round"` template.
    pub fn new(client: Arc<dyn LLMClient>, prompts: HashMap<String, String>) -> Self {
        Self { client, prompts }
    }

    /// Pulls the first JSON object out of a model reply, tolerating code fences
    /// and surrounding prose.
    fn parse_verdict(reply: &str) -> Result<JudgeVerdict> {
        let start = reply.find('{').context("Judge reply contains no JSON object")?;
        let end = reply.rfind('}').context("Judge reply contains no JSON object")?;
        anyhow::ensure!(end > start, "Judge reply contains no JSON object");
        serde_json::from_str(&reply[start..=end]).context("Judge reply is not a valid verdict")
    }
}

#[async_trait]
impl ScoringPort for LlmJudge {
    async fn score(&self, topic: &Topic, turn_a: &Turn, turn_b: &Turn) -> Result<Score> {
        let prompt = self
            .prompts
            .get(JUDGE_PROMPT_KEY)
            .with_context(|| format!("Missing prompt template: '{JUDGE_PROMPT_KEY}'"))?
            .replace("{topic}", topic.as_str())
            .replace("{round}", &turn_a.round.to_string())
            .replace("{speaker_a}", &turn_a.speaker)
            .replace("{argument_a}", &turn_a.text)
            .replace("{speaker_b}", &turn_b.speaker)
            .replace("{argument_b}", &turn_b.text);

        let options = CompletionOptions {
            temperature: 0.0,
            max_tokens: 150,
            seed: None,
        };
        let reply = self
            .client
            .complete(JUDGE_SYSTEM_PROMPT, &prompt, options)
            .await?;
        let verdict = Self::parse_verdict(&reply)?;

        let score = Score::new(
            turn_a.round,
            verdict.coherence,
            verdict.engagement,
            verdict.argument_strength,
        )?;
        Ok(score)
    }
}

/// Per-dimension figures computed over the scored rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub coherence: f64,
    pub engagement: f64,
    pub argument_strength: f64,
}

impl DimensionScores {
    pub fn total(&self) -> f64 {
        self.coherence + self.engagement + self.argument_strength
    }
}

/// Aggregate statistics attached to a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Name of the aggregator that produced `aggregate`.
    pub aggregator: String,
    pub scored_rounds: u32,
    /// Rounds (1-based) whose score is missing.
    pub missing_rounds: Vec<u32>,
    /// `None` when no round was scored.
    pub aggregate: Option<DimensionScores>,
}

/// Collapses per-round scores into summary figures.
///
/// Implementations must be deterministic: the same scores always produce the
/// same summary.
pub trait ScoreAggregator: Send + Sync {
    fn name(&self) -> &'static str;

    fn aggregate(&self, scores: &[Option<Score>]) -> Option<DimensionScores>;

    fn summarize(&self, scores: &[Option<Score>]) -> ScoreSummary {
        ScoreSummary {
            aggregator: self.name().to_string(),
            scored_rounds: scores.iter().flatten().count() as u32,
            missing_rounds: scores
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_none())
                .map(|(i, _)| i as u32 + 1)
                .collect(),
            aggregate: self.aggregate(scores),
        }
    }
}

/// Unweighted arithmetic mean of each dimension over the scored rounds.
/// Missing rounds are skipped, not counted as zero.
#[derive(Debug, Default, Clone)]
pub struct MeanAggregator;

impl ScoreAggregator for MeanAggregator {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn aggregate(&self, scores: &[Option<Score>]) -> Option<DimensionScores> {
        let scored: Vec<&Score> = scores.iter().flatten().collect();
        if scored.is_empty() {
            return None;
        }
        let n = scored.len() as f64;
        let mean = |f: fn(&Score) -> f64| scored.iter().map(|s| f(s)).sum::<f64>() / n;
        Some(DimensionScores {
            coherence: mean(|s| s.coherence),
            engagement: mean(|s| s.engagement),
            argument_strength: mean(|s| s.argument_strength),
        })
    }
}

/// The judge's final call on a completed debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// `None` when both roles reach the same total.
    pub winner: Option<Role>,
    pub role_a: DimensionScores,
    pub role_b: DimensionScores,
    /// Difference between the two totals, on `0..=30`.
    pub margin: f64,
    pub justification: String,
}

impl Verdict {
    /// Scores both roles with [`HeuristicJudge::role_scores`] and compares
    /// their totals.
    pub fn decide(turns: &[Turn], personas: &Personas) -> Self {
        let role_a = HeuristicJudge::role_scores(turns, Role::A);
        let role_b = HeuristicJudge::role_scores(turns, Role::B);
        let (total_a, total_b) = (role_a.total(), role_b.total());

        let winner = if total_a > total_b {
            Some(Role::A)
        } else if total_b > total_a {
            Some(Role::B)
        } else {
            None
        };
        let margin = (total_a - total_b).abs();

        let justification = match winner {
            Some(role) => {
                let scores = if role == Role::A { role_a } else { role_b };
                let closeness = if margin > 5.0 {
                    "decisive"
                } else if margin > 2.0 {
                    "close but clear"
                } else {
                    "very close"
                };
                let structure = if scores.coherence > 6.0 {
                    "well-structured"
                } else {
                    "engaged"
                };
                let support = if scores.argument_strength > 6.0 {
                    "evidence-based"
                } else {
                    "logically sound"
                };
                format!(
                    "{} wins {total_a:.2} to {total_b:.2}, a {closeness} margin of {margin:.2}. \
                     Their arguments were {structure} and {support}.",
                    personas.get(role).name
                )
            }
            None => format!(
                "{} and {} tied at {total_a:.2} points.",
                personas.a.name, personas.b.name
            ),
        };

        Self {
            winner,
            role_a,
            role_b,
            margin,
            justification,
        }
    }

    pub fn for_role(&self, role: Role) -> &DimensionScores {
        match role {
            Role::A => &self.role_a,
            Role::B => &self.role_b,
        }
    }
}
