use anyhow::{Result, bail};
use async_trait::async_trait;
use debate_core::participant::{ParticipantPort, ScriptedParticipant, TurnRequest};
use debate_core::scoring::{HeuristicJudge, ScoringPort};
use debate_core::sink::{JsonFileSink, MemorySink, TranscriptSink};
use debate_core::state_machine::DebateState;
use debate_core::{
    DebateError, ROUNDS, RoundOrchestrator, Role, Score, SessionStatus, Topic, Transcript, Turn,
};
use std::sync::Arc;

const TOPIC: &str = "Should AI be regulated like medicine?";

/// Delegates to the scripted participant except for one round.
struct FailsInRound(u32);

#[async_trait]
impl ParticipantPort for FailsInRound {
    async fn generate(&self, request: TurnRequest<'_>) -> Result<String> {
        if request.round == self.0 {
            bail!("model unavailable");
        }
        ScriptedParticipant.generate(request).await
    }
}

/// Delegates to the heuristic judge except for one round.
struct JudgeFailsInRound(u32);

#[async_trait]
impl ScoringPort for JudgeFailsInRound {
    async fn score(&self, topic: &Topic, turn_a: &Turn, turn_b: &Turn) -> Result<Score> {
        if turn_a.round == self.0 {
            bail!("judge returned garbage");
        }
        HeuristicJudge.score(topic, turn_a, turn_b).await
    }
}

struct BrokenSink;

#[async_trait]
impl TranscriptSink for BrokenSink {
    async fn persist(&self, _transcript: &Transcript) -> Result<()> {
        bail!("disk full")
    }
}

fn scripted(sink: Arc<dyn TranscriptSink>) -> RoundOrchestrator {
    RoundOrchestrator::new(
        Arc::new(ScriptedParticipant),
        Arc::new(ScriptedParticipant),
        Arc::new(HeuristicJudge),
        sink,
    )
}

fn assert_alternation(turns: &[Turn]) {
    for (i, turn) in turns.iter().enumerate() {
        assert_eq!(turn.round, i as u32 / 2 + 1, "turn {i} has the wrong round");
        let role = if i % 2 == 0 { Role::A } else { Role::B };
        assert_eq!(turn.role, role, "turn {i} has the wrong role");
    }
}

#[tokio::test]
async fn test_full_debate_completes_with_sixteen_turns() {
    let sink = Arc::new(MemorySink::new());
    let outcome = scripted(sink.clone()).run(TOPIC, Some(42)).await.unwrap();

    assert!(outcome.is_completed());
    assert!(outcome.sink_error().is_none());
    let transcript = outcome.transcript();
    assert_eq!(transcript.status, SessionStatus::Completed);
    assert_eq!(transcript.topic.as_str(), TOPIC);
    assert_eq!(transcript.turns.len(), 16);
    assert_eq!(transcript.rounds_completed, ROUNDS);
    assert!(transcript.scores.len() <= ROUNDS as usize);
    assert_alternation(&transcript.turns);
    assert_eq!(transcript.turns_for(Role::A).count(), 8);
    assert!(transcript.turns_for(Role::A).all(|t| t.speaker == "Scientist"));
    assert!(transcript.turns_for(Role::B).all(|t| t.speaker == "Philosopher"));

    assert_eq!(
        transcript.transitions.last().map(|t| t.to),
        Some(DebateState::Completed)
    );
    let verdict = transcript.verdict.as_ref().unwrap();
    assert!(verdict.margin >= 0.0);
    assert_eq!(verdict.winner.is_none(), verdict.margin == 0.0);
    assert_eq!(sink.transcripts().await, vec![transcript.clone()]);
}

#[tokio::test]
async fn test_short_topic_is_rejected_before_any_round() {
    let sink = Arc::new(MemorySink::new());
    let err = scripted(sink.clone()).run("AI?", None).await.unwrap_err();

    assert!(matches!(err, DebateError::InvalidTopic { .. }));
    assert!(sink.transcripts().await.is_empty());
}

#[tokio::test]
async fn test_topic_bounds_count_characters_after_trimming() {
    let orchestrator = scripted(Arc::new(MemorySink::new()));

    assert!(orchestrator.run(&"x".repeat(9), None).await.is_err());
    assert!(orchestrator.run(&"x".repeat(501), None).await.is_err());

    let padded = format!("   {}   ", "é".repeat(10));
    let outcome = orchestrator.run(&padded, None).await.unwrap();
    assert_eq!(outcome.transcript().topic.as_str(), "é".repeat(10));
}

#[tokio::test]
async fn test_participant_failure_in_round_five_aborts_with_nine_turns() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = RoundOrchestrator::new(
        Arc::new(ScriptedParticipant),
        Arc::new(FailsInRound(5)),
        Arc::new(HeuristicJudge),
        sink.clone(),
    );

    let outcome = orchestrator.run(TOPIC, Some(1)).await.unwrap();
    assert!(!outcome.is_completed());

    let error = outcome.error().unwrap();
    assert_eq!(error.round(), Some(5));
    assert_eq!(error.role(), Some(Role::B));
    assert!(error.to_string().contains("model unavailable"));

    let transcript = outcome.transcript();
    assert_eq!(transcript.turns.len(), 9);
    assert_alternation(&transcript.turns);
    assert_eq!(transcript.scores.len(), 4);
    assert_eq!(transcript.failure(), Some(error));
    assert!(transcript.verdict.is_none());

    let stored = sink.last().await.unwrap();
    assert_eq!(stored.turns.len(), 9);
    assert!(!stored.is_completed());
}

#[tokio::test]
async fn test_scoring_failure_leaves_one_round_unscored() {
    let orchestrator = RoundOrchestrator::new(
        Arc::new(ScriptedParticipant),
        Arc::new(ScriptedParticipant),
        Arc::new(JudgeFailsInRound(3)),
        Arc::new(MemorySink::new()),
    );

    let outcome = orchestrator.run(TOPIC, Some(2)).await.unwrap();
    assert!(outcome.is_completed());

    let transcript = outcome.transcript();
    assert_eq!(transcript.turns.len(), 16);
    assert_eq!(transcript.valid_scores().count(), 7);
    assert_eq!(transcript.missing_score_rounds(), vec![3]);
    assert_eq!(transcript.summary.scored_rounds, 7);
    assert_eq!(transcript.summary.missing_rounds, vec![3]);
    assert!(transcript.summary.aggregate.is_some());
}

#[tokio::test]
async fn test_sink_failure_is_reported_without_changing_status() {
    let outcome = scripted(Arc::new(BrokenSink)).run(TOPIC, None).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.transcript().status, SessionStatus::Completed);
    match outcome.sink_error() {
        Some(DebateError::Sink { reason }) => assert!(reason.contains("disk full")),
        other => panic!("expected a sink error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_json_sink_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonFileSink::new(dir.path().join("nested").join("debate.json"));
    let outcome = scripted(Arc::new(sink.clone()))
        .run(TOPIC, Some(7))
        .await
        .unwrap();
    assert!(outcome.sink_error().is_none());
    let original = outcome.transcript();

    let loaded = JsonFileSink::load(sink.path()).await.unwrap();
    assert_eq!(&loaded, original);
    assert!(loaded.verdict.is_some());

    let text = std::fs::read_to_string(sink.text_path()).unwrap();
    assert!(text.contains(&format!("Topic: {TOPIC}")));
    assert!(text.contains("[Round 8] Philosopher:"));
    assert!(text.contains("Status: completed (8 rounds)"));
}

#[tokio::test]
async fn test_live_reader_observes_the_session() {
    let orchestrator = scripted(Arc::new(MemorySink::new()));
    let session = orchestrator.prepare(TOPIC, Some(3)).unwrap();
    let reader = session.context().reader();
    assert_eq!(reader.len().await, 0);

    let outcome = orchestrator.run_session(session).await;
    assert!(outcome.is_completed());
    assert_eq!(reader.len().await, 16);
    assert_eq!(reader.snapshot().await, outcome.transcript().turns);

    let context = reader.context_for(Role::B, 4).await;
    assert_eq!(context.len(), 7);
    assert_eq!(context.last().map(|t| (t.round, t.role)), Some((4, Role::A)));
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = scripted(sink.clone());

    let (first, second) = tokio::join!(
        orchestrator.run(TOPIC, Some(1)),
        orchestrator.run("Is remote work better for productivity?", Some(1)),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_ne!(first.transcript().id, second.transcript().id);
    assert_eq!(first.transcript().turns.len(), 16);
    assert_eq!(second.transcript().turns.len(), 16);
    assert!(second.transcript().turns.iter().all(|t| !t.text.contains(TOPIC)));
    assert_eq!(sink.transcripts().await.len(), 2);
}
