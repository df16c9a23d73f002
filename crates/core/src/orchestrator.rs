//! Round Orchestrator
//!
//! Drives one debate session through its fixed eight rounds. Within a round
//! role A speaks, then role B (seeing A's argument), then the judge scores the
//! pair. The three port calls are the only suspension points; each runs under
//! a timeout and can be interrupted by the cancellation token. A turn or score
//! is only recorded after its call has resolved, so an interrupted call never
//! leaves a partial write behind.
//!
//! Failure policy:
//! * participant failure, timeout or cancellation aborts the session;
//! * judge failure or timeout leaves the round unscored and play continues;
//! * the frozen transcript is handed to the sink in both cases, under its own
//!   timeout; a sink failure is reported but never changes the status.
//!
//! Events are sent without waiting: a lagging or closed receiver loses events
//! instead of stalling the session.

use crate::coherence::{CoherenceNote, review_turn};
use crate::error::DebateError;
use crate::participant::{ParticipantPort, TurnRequest};
use crate::scoring::{MeanAggregator, ScoreAggregator, ScoringPort};
use crate::session::{DebateSession, Personas, Role, Score, SessionStatus, Transcript, Turn};
use crate::sink::TranscriptSink;
use crate::state_machine::{DebateState, StateMachine};
use crate::topic::Topic;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Timeouts applied to the external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub turn_timeout: Duration,
    pub scoring_timeout: Duration,
    pub sink_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(60),
            scoring_timeout: Duration::from_secs(30),
            sink_timeout: Duration::from_secs(30),
        }
    }
}

/// Progress notifications broadcast while a session runs.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    StateChanged(DebateState),
    TurnRecorded(Turn),
    /// `score` is `None` when the judge failed for this round.
    RoundScored { round: u32, score: Option<Score> },
    Finished(SessionStatus),
}

/// How a session ended.
#[derive(Debug, Clone)]
pub enum DebateOutcome {
    /// All rounds were played.
    Completed {
        transcript: Transcript,
        sink_error: Option<DebateError>,
    },
    /// A fatal error stopped the session; `transcript` holds what was recorded.
    Aborted {
        transcript: Transcript,
        error: DebateError,
        sink_error: Option<DebateError>,
    },
}

impl DebateOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn transcript(&self) -> &Transcript {
        match self {
            Self::Completed { transcript, .. } | Self::Aborted { transcript, .. } => transcript,
        }
    }

    pub fn into_transcript(self) -> Transcript {
        match self {
            Self::Completed { transcript, .. } | Self::Aborted { transcript, .. } => transcript,
        }
    }

    /// The error that aborted the session.
    pub fn error(&self) -> Option<&DebateError> {
        match self {
            Self::Completed { .. } => None,
            Self::Aborted { error, .. } => Some(error),
        }
    }

    /// Set when the transcript could not be persisted. Does not change the status.
    pub fn sink_error(&self) -> Option<&DebateError> {
        match self {
            Self::Completed { sink_error, .. } | Self::Aborted { sink_error, .. } => {
                sink_error.as_ref()
            }
        }
    }
}

/// Derives a distinct, reproducible seed for each turn from the session seed.
fn turn_seed(seed: Option<u64>, round: u32, role: Role) -> Option<u64> {
    seed.map(|s| {
        s.wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(u64::from(round) * 2 + role.index() as u64)
    })
}

/// The debate state machine driver.
///
/// An orchestrator holds only collaborators and settings; every call to
/// [`run`](Self::run) creates its own [`DebateSession`], so one orchestrator
/// can serve concurrent sessions.
pub struct RoundOrchestrator {
    participant_a: Arc<dyn ParticipantPort>,
    participant_b: Arc<dyn ParticipantPort>,
    scorer: Arc<dyn ScoringPort>,
    sink: Arc<dyn TranscriptSink>,
    aggregator: Arc<dyn ScoreAggregator>,
    personas: Personas,
    config: OrchestratorConfig,
    events: Option<mpsc::Sender<DebateEvent>>,
    cancel: CancellationToken,
}

impl RoundOrchestrator {
    pub fn new(
        participant_a: Arc<dyn ParticipantPort>,
        participant_b: Arc<dyn ParticipantPort>,
        scorer: Arc<dyn ScoringPort>,
        sink: Arc<dyn TranscriptSink>,
    ) -> Self {
        Self {
            participant_a,
            participant_b,
            scorer,
            sink,
            aggregator: Arc::new(MeanAggregator),
            personas: Personas::default(),
            config: OrchestratorConfig::default(),
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_personas(mut self, personas: Personas) -> Self {
        self.personas = personas;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn ScoreAggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Broadcast progress to `tx`. Events that do not fit in the channel, or
    /// whose receiver is gone, are logged and dropped.
    pub fn with_events(mut self, tx: mpsc::Sender<DebateEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Abort at the next suspension point once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Validates `raw_topic` and creates a session for it.
    ///
    /// Callers that want a live view of the context store can take
    /// `session.context().reader()` before passing the session to
    /// [`run_session`](Self::run_session).
    pub fn prepare(&self, raw_topic: &str, seed: Option<u64>) -> Result<DebateSession, DebateError> {
        let topic = Topic::validate(raw_topic)?;
        Ok(DebateSession::new(topic, self.personas.clone(), seed))
    }

    /// Runs a full debate on `raw_topic`.
    ///
    /// Returns `Err` only for an invalid topic, before any round starts. Every
    /// other failure is reported through [`DebateOutcome::Aborted`].
    pub async fn run(&self, raw_topic: &str, seed: Option<u64>) -> Result<DebateOutcome, DebateError> {
        let session = self.prepare(raw_topic, seed)?;
        Ok(self.run_session(session).await)
    }

    /// Drives a prepared session to a terminal state and persists it.
    ///
    /// `Completed` is recorded before aggregation, freeze and sink hand-off so
    /// the persisted transcript carries its terminal state.
    #[instrument(name = "debate", skip_all, fields(session_id = %session.id()))]
    pub async fn run_session(&self, mut session: DebateSession) -> DebateOutcome {
        info!(topic = %session.topic(), seed = ?session.seed(), "Debate starting");
        let mut machine = StateMachine::new();

        match self.play(&mut session, &mut machine).await {
            Ok(()) => {
                if let Err(e) = self.transition(&mut machine, DebateState::Completed, None) {
                    return self.abort(session, machine, e).await;
                }
                let summary = self.aggregator.summarize(session.scores());
                let transcript = session
                    .freeze(SessionStatus::Completed, summary, machine.into_transitions())
                    .await;
                let sink_error = self.hand_off(&transcript).await;
                info!(
                    turns = transcript.turns.len(),
                    scored_rounds = transcript.summary.scored_rounds,
                    "Debate completed"
                );
                self.emit(DebateEvent::Finished(SessionStatus::Completed));
                DebateOutcome::Completed {
                    transcript,
                    sink_error,
                }
            }
            Err(error) => self.abort(session, machine, error).await,
        }
    }

    async fn play(
        &self,
        session: &mut DebateSession,
        machine: &mut StateMachine,
    ) -> Result<(), DebateError> {
        self.transition(machine, DebateState::Validating, Some("topic accepted"))?;

        while let Some(round) = session.begin_next_round() {
            self.transition(machine, DebateState::AwaitingRoleA { round }, None)?;
            let turn_a = self.take_turn(session, Role::A, round).await?;

            self.transition(machine, DebateState::AwaitingRoleB { round }, None)?;
            let turn_b = self.take_turn(session, Role::B, round).await?;

            self.transition(machine, DebateState::Scoring { round }, None)?;
            let score = self
                .score_round(session.topic(), &turn_a, &turn_b, round)
                .await?;
            session.close_round(score);
            self.emit(DebateEvent::RoundScored { round, score });
        }

        self.transition(machine, DebateState::Finalizing, None)
    }

    /// Asks one participant for its argument and records it.
    async fn take_turn(
        &self,
        session: &mut DebateSession,
        role: Role,
        round: u32,
    ) -> Result<Turn, DebateError> {
        let context = session.context().context_for(role, round).await;
        let participant = match role {
            Role::A => &self.participant_a,
            Role::B => &self.participant_b,
        };
        let persona = session.personas().get(role);
        let request = TurnRequest {
            round,
            role,
            persona,
            topic: session.topic(),
            context: &context,
            seed: turn_seed(session.seed(), round, role),
        };

        let limit = self.config.turn_timeout;
        let text = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(DebateError::Cancelled { round, role: Some(role) });
            }
            result = timeout(limit, participant.generate(request)) => match result {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    return Err(DebateError::Generation { round, role, reason: format!("{e:#}") });
                }
                Err(_) => {
                    return Err(DebateError::Generation {
                        round,
                        role,
                        reason: format!("timed out after {limit:?}"),
                    });
                }
            },
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(DebateError::Generation {
                round,
                role,
                reason: "participant returned an empty argument".to_string(),
            });
        }

        let turn = Turn::new(round, role, persona.name.clone(), text);
        session.context().append(turn.clone()).await?;
        info!(
            round,
            role = %role,
            speaker = %turn.speaker,
            chars = turn.text.chars().count(),
            "Argument recorded"
        );

        if let Some(issue) = review_turn(session.topic(), &turn, &context) {
            warn!(round, role = %role, %issue, "Coherence issue");
            session.add_note(CoherenceNote { round, role, issue });
        }

        self.emit(DebateEvent::TurnRecorded(turn.clone()));
        Ok(turn)
    }

    /// Asks the judge to score a round. Judge failures yield `Ok(None)`;
    /// only cancellation is an error.
    async fn score_round(
        &self,
        topic: &Topic,
        turn_a: &Turn,
        turn_b: &Turn,
        round: u32,
    ) -> Result<Option<Score>, DebateError> {
        let limit = self.config.scoring_timeout;
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(DebateError::Cancelled { round, role: None });
            }
            result = timeout(limit, self.scorer.score(topic, turn_a, turn_b)) => result,
        };

        let scored = match outcome {
            Ok(Ok(score)) => score.check(round).map(|()| score),
            Ok(Err(e)) => Err(DebateError::Scoring {
                round,
                reason: format!("{e:#}"),
            }),
            Err(_) => Err(DebateError::Scoring {
                round,
                reason: format!("timed out after {limit:?}"),
            }),
        };

        match scored {
            Ok(score) => {
                info!(
                    round,
                    coherence = score.coherence,
                    engagement = score.engagement,
                    argument_strength = score.argument_strength,
                    "Round scored"
                );
                Ok(Some(score))
            }
            Err(e) => {
                warn!(round, error = %e, "Round left unscored");
                Ok(None)
            }
        }
    }

    async fn abort(
        &self,
        session: DebateSession,
        mut machine: StateMachine,
        error: DebateError,
    ) -> DebateOutcome {
        error!(error = %error, "Debate aborted");
        if let Err(e) = machine.abort(&error.to_string()) {
            warn!(error = %e, "Could not record abort transition");
        }
        self.emit(DebateEvent::StateChanged(DebateState::Aborted));

        let summary = self.aggregator.summarize(session.scores());
        let status = SessionStatus::Aborted {
            error: error.clone(),
        };
        let transcript = session
            .freeze(status.clone(), summary, machine.into_transitions())
            .await;
        let sink_error = self.hand_off(&transcript).await;
        self.emit(DebateEvent::Finished(status));

        DebateOutcome::Aborted {
            transcript,
            error,
            sink_error,
        }
    }

    fn transition(
        &self,
        machine: &mut StateMachine,
        to: DebateState,
        reason: Option<&str>,
    ) -> Result<(), DebateError> {
        machine.advance(to, reason)?;
        self.emit(DebateEvent::StateChanged(to));
        Ok(())
    }

    /// Persists the transcript under `sink_timeout`.
    ///
    /// Cancellation interrupts the save only if it arrives during the save; a
    /// session aborted by cancellation still gets one bounded attempt.
    async fn hand_off(&self, transcript: &Transcript) -> Option<DebateError> {
        let limit = self.config.sink_timeout;
        let interruptible = !self.cancel.is_cancelled();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled(), if interruptible => {
                Err("cancelled before the transcript was saved".to_string())
            }
            result = timeout(limit, self.sink.persist(transcript)) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_) => Err(format!("timed out after {limit:?}")),
            },
        };

        match result {
            Ok(()) => None,
            Err(reason) => {
                error!(%reason, "Failed to persist transcript");
                Some(DebateError::Sink { reason })
            }
        }
    }

    fn emit(&self, event: DebateEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event receiver is lagging; dropping debate event.");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Failed to broadcast debate event: receiver dropped.");
            }
        }
    }
}
