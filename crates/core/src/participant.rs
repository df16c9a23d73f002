//! Debater Services
//!
//! A participant turns a role, a topic and the debate so far into the next
//! argument. The orchestrator only ever sees the [`ParticipantPort`] trait; the
//! backing generator can be an LLM, a scripted fake, or anything else that
//! answers within the orchestrator's timeout.

use crate::context::summarize;
use crate::llm_client::{CompletionOptions, LLMClient};
use crate::session::{Persona, ROUNDS, Role, Turn};
use crate::topic::Topic;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a participant may look at when producing its argument.
///
/// The context is a borrowed slice, so a participant cannot append to the
/// session's context store.
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub round: u32,
    pub role: Role,
    pub persona: &'a Persona,
    pub topic: &'a Topic,
    /// Every earlier turn, oldest first.
    pub context: &'a [Turn],
    /// Per-turn seed derived from the session seed, if one was given.
    pub seed: Option<u64>,
}

impl TurnRequest<'_> {
    /// The most recent argument made by the other side.
    pub fn opponent_last(&self) -> Option<&Turn> {
        self.context.iter().rev().find(|t| t.role != self.role)
    }

    /// Arguments this side has already made.
    pub fn own_turns(&self) -> impl Iterator<Item = &Turn> {
        self.context.iter().filter(move |t| t.role == self.role)
    }
}

/// Defines the contract for any service that can argue one side of a debate.
#[async_trait]
pub trait ParticipantPort: Send + Sync {
    /// Produces the argument text for the requested turn.
    async fn generate(&self, request: TurnRequest<'_>) -> Result<String>;
}

/// Share of distinct words two arguments have in common, relative to the
/// longer one.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a_words: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let b_words: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    let longest = a_words.len().max(b_words.len());
    if longest == 0 {
        return 0.0;
    }
    a_words.intersection(&b_words).count() as f64 / longest as f64
}

/// A `ParticipantPort` backed by an OpenAI-compatible chat model.
///
/// The persona is written into the system prompt. Only the last
/// `context_window` turns are quoted back to the model, together with a short
/// summary of the whole debate. When the model repeats itself (more than
/// `SIMILARITY_THRESHOLD` word overlap with one of its earlier arguments) the
/// turn is regenerated, up to `MAX_ATTEMPTS` times.
pub struct LlmParticipant {
    client: Arc<dyn LLMClient>,
    prompts: HashMap<String, String>,
    context_window: usize,
    options: CompletionOptions,
}

const SYSTEM_PROMPT_KEY: &str = "participant_system";
const TURN_PROMPT_KEY: &str = "participant_turn";
const MAX_ATTEMPTS: usize = 3;
const SIMILARITY_THRESHOLD: f64 = 0.7;

impl LlmParticipant {
    /// Creates a new LLM-backed participant.
    ///
    /// # Arguments
    ///
    /// * `client` - The chat client shared with the rest of the session.
    /// * `prompts` - Template strings; must contain `"participant_system"` and
    ///   `"participant_turn"`.
    /// * `context_window` - How many of the latest turns to quote verbatim.
    pub fn new(
        client: Arc<dyn LLMClient>,
        prompts: HashMap<String, String>,
        context_window: usize,
    ) -> Self {
        Self {
            client,
            prompts,
            context_window,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    fn template(&self, key: &str) -> Result<&str> {
        self.prompts
            .get(key)
            .map(String::as_str)
            .with_context(|| format!("Missing prompt template: '{key}'"))
    }

    fn system_prompt(&self, persona: &Persona) -> Result<String> {
        Ok(self
            .template(SYSTEM_PROMPT_KEY)?
            .replace("{name}", &persona.name)
            .replace("{role}", &persona.role)
            .replace("{style}", &persona.style)
            .replace("{expertise}", &persona.expertise))
    }

    fn turn_prompt(&self, request: &TurnRequest<'_>) -> Result<String> {
        let window_start = request.context.len().saturating_sub(self.context_window);
        let recent = request.context[window_start..]
            .iter()
            .map(|t| format!("[Round {}] {}: {}", t.round, t.speaker, t.text))
            .collect::<Vec<_>>()
            .join("\n");
        let opponent_last = request
            .opponent_last()
            .map(|t| t.text.as_str())
            .unwrap_or("This is the opening statement.");

        Ok(self
            .template(TURN_PROMPT_KEY)?
            .replace("{topic}", request.topic.as_str())
            .replace("{round}", &request.round.to_string())
            .replace("{rounds}", &ROUNDS.to_string())
            .replace("{opponent_last}", opponent_last)
            .replace("{recent}", &recent)
            .replace("{summary}", &summarize(request.context)))
    }

    fn repeats_itself(&self, argument: &str, request: &TurnRequest<'_>) -> bool {
        request
            .own_turns()
            .any(|t| word_overlap(argument, &t.text) > SIMILARITY_THRESHOLD)
    }
}

#[async_trait]
impl ParticipantPort for LlmParticipant {
    async fn generate(&self, request: TurnRequest<'_>) -> Result<String> {
        let system_prompt = self.system_prompt(request.persona)?;
        let user_prompt = self.turn_prompt(&request)?;

        let mut argument = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            // Vary the seed per attempt so a seeded provider can produce a different answer.
            let options = CompletionOptions {
                seed: request.seed.map(|s| s.wrapping_add(attempt as u64 - 1)),
                ..self.options
            };
            argument = self
                .client
                .complete(&system_prompt, &user_prompt, options)
                .await
                .with_context(|| format!("{} failed to produce an argument", request.persona.name))?;

            if !self.repeats_itself(&argument, &request) {
                return Ok(argument);
            }
            debug!(
                round = request.round,
                role = %request.role,
                attempt,
                "Argument repeats an earlier point; regenerating"
            );
        }

        warn!(
            round = request.round,
            role = %request.role,
            "Argument still repetitive after {MAX_ATTEMPTS} attempts"
        );
        argument.push_str(&format!(
            " This point is particularly relevant in round {}.",
            request.round
        ));
        Ok(argument)
    }
}

/// A deterministic, offline `ParticipantPort`.
///
/// Builds arguments from fixed phrase banks, choosing phrases with a
/// `StdRng` seeded from the request seed. The same seed always yields the same
/// debate, which makes it useful for demos and integration tests.
#[derive(Debug, Default, Clone)]
pub struct ScriptedParticipant;

const OPENINGS: &[&str] = &[
    "Research on this question consistently shows",
    "The evidence we already have demonstrates",
    "Historically, societies that faced this choice learned",
    "Careful analysis of the data suggests",
    "Studies from several fields indicate",
    "Experience in comparable cases shows",
];

const CLAIMS: &[&str] = &[
    "that the stakes are high enough to demand clear rules, because unmanaged risk compounds over time",
    "that incentives matter more than intentions, therefore any answer must account for how people actually behave",
    "that the burden of proof should rest on those proposing change, since the costs of error fall on everyone",
    "that a balanced approach is possible, because the strongest objections concern implementation rather than principle",
    "that public trust depends on transparency, which implies that decisions must be explainable",
    "that long-term consequences outweigh short-term convenience, thus caution is justified",
];

const REBUTTALS: &[&str] = &[
    "but that argument overlooks who bears the cost",
    "yet this assumes the facts are more settled than they are",
    "however the same reasoning would justify conclusions my opponent rejects",
    "but the data behind that claim is thinner than it appears",
    "although that point ignores the precedent set by earlier cases",
];

impl ScriptedParticipant {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ParticipantPort for ScriptedParticipant {
    async fn generate(&self, request: TurnRequest<'_>) -> Result<String> {
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let opening = OPENINGS[rng.random_range(0..OPENINGS.len())];
        let claim = CLAIMS[rng.random_range(0..CLAIMS.len())];

        let mut argument = format!(
            "As a {}, on \"{}\": {} {}.",
            request.persona.role, request.topic, opening, claim
        );

        if let Some(last) = request.opponent_last() {
            let excerpt: String = last.text.chars().take(60).collect();
            let rebuttal = REBUTTALS[rng.random_range(0..REBUTTALS.len())];
            argument.push_str(&format!(
                " {} said \"{}...\", {}.",
                last.speaker, excerpt, rebuttal
            ));
        }

        argument.push_str(&format!(" (round {} of {ROUNDS})", request.round));
        Ok(argument)
    }
}
