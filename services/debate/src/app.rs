//! Wires configuration into a ready-to-run orchestrator.

use crate::config::{Config, Provider};
use anyhow::{Context, Result};
use debate_core::llm_client::{LLMClient, OpenAICompatibleClient};
use debate_core::participant::{LlmParticipant, ParticipantPort, ScriptedParticipant};
use debate_core::scoring::{HeuristicJudge, LlmJudge, ScoringPort};
use debate_core::sink::TranscriptSink;
use debate_core::{Personas, RoundOrchestrator};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Prompt templates every LLM-backed run needs.
pub const REQUIRED_PROMPTS: &[&str] = &["participant_system", "participant_turn", "judge_round"];

/// The generators behind both roles and the judge.
pub struct Services {
    pub participant_a: Arc<dyn ParticipantPort>,
    pub participant_b: Arc<dyn ParticipantPort>,
    pub scorer: Arc<dyn ScoringPort>,
}

/// Loads every `.md` file in `prompts_path`, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = std::fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = std::fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

/// Reads a personas file (`{"agent_a": {...}, "agent_b": {...}}`), or returns
/// the defaults when no path is configured.
pub fn load_personas(path: Option<&Path>) -> Result<Personas> {
    let Some(path) = path else {
        return Ok(Personas::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read personas file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse personas file {}", path.display()))
}

/// Builds the participants and judge for the configured provider.
pub fn build_services(config: &Config) -> Result<Services> {
    let client: Arc<dyn LLMClient> = match config.provider {
        Provider::Offline => {
            info!("Using offline provider.");
            return Ok(Services {
                participant_a: Arc::new(ScriptedParticipant::new()),
                participant_b: Arc::new(ScriptedParticipant::new()),
                scorer: Arc::new(HeuristicJudge::new()),
            });
        }
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY must be set for 'openai' provider")?;
            Arc::new(OpenAICompatibleClient::openai(api_key, config.chat_model.clone()))
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY must be set for 'gemini' provider")?;
            Arc::new(OpenAICompatibleClient::gemini(api_key, config.chat_model.clone()))
        }
    };

    let prompts = load_prompts(&config.prompts_path)?;
    for key in REQUIRED_PROMPTS {
        anyhow::ensure!(
            prompts.contains_key(*key),
            "{key}.md not found in prompts directory {}",
            config.prompts_path.display()
        );
    }

    Ok(Services {
        participant_a: Arc::new(LlmParticipant::new(
            client.clone(),
            prompts.clone(),
            config.context_window,
        )),
        participant_b: Arc::new(LlmParticipant::new(
            client.clone(),
            prompts.clone(),
            config.context_window,
        )),
        scorer: Arc::new(LlmJudge::new(client, prompts)),
    })
}

/// Assembles an orchestrator from configuration and the given sink.
pub fn build_orchestrator(
    config: &Config,
    sink: Arc<dyn TranscriptSink>,
) -> Result<RoundOrchestrator> {
    let services = build_services(config)?;
    let personas = load_personas(config.personas_path.as_deref())?;
    info!(
        agent_a = %personas.a.name,
        agent_b = %personas.b.name,
        provider = %config.provider,
        model = %config.chat_model,
        "Debate services configured"
    );

    Ok(RoundOrchestrator::new(
        services.participant_a,
        services.participant_b,
        services.scorer,
        sink,
    )
    .with_personas(personas)
    .with_config(config.orchestrator_config()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use debate_core::sink::MemorySink;
    use std::path::PathBuf;
    use std::time::Duration;
    use tracing::Level;

    fn offline_config(prompts_path: PathBuf) -> Config {
        Config {
            provider: Provider::Offline,
            openai_api_key: None,
            gemini_api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            log_level: Level::INFO,
            prompts_path,
            transcript_dir: PathBuf::from("./logs"),
            turn_timeout: Duration::from_secs(5),
            scoring_timeout: Duration::from_secs(5),
            sink_timeout: Duration::from_secs(5),
            context_window: 6,
            personas_path: None,
        }
    }

    #[test]
    fn test_load_prompts_keys_by_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("participant_turn.md"), "Round {round}").unwrap();
        std::fs::write(dir.path().join("judge_round.md"), "Judge {topic}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let prompts = load_prompts(dir.path()).unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts["participant_turn"], "Round {round}");
        assert!(!prompts.contains_key("notes"));
    }

    #[test]
    fn test_load_prompts_missing_directory() {
        let err = load_prompts(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("prompts directory"));
    }

    #[test]
    fn test_load_personas_default_and_file() {
        assert_eq!(load_personas(None).unwrap(), Personas::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("personas.json");
        std::fs::write(
            &path,
            r#"{
                "agent_a": {"id": "a", "name": "Economist", "role": "labour economist"},
                "agent_b": {"id": "b", "name": "Historian", "role": "economic historian",
                            "style": "Narrative", "expertise": "industrial revolutions"}
            }"#,
        )
        .unwrap();

        let personas = load_personas(Some(&path)).unwrap();
        assert_eq!(personas.a.name, "Economist");
        assert_eq!(personas.a.style, "");
        assert_eq!(personas.b.expertise, "industrial revolutions");
    }

    #[test]
    fn test_load_personas_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("personas.json");
        std::fs::write(&path, r#"{"agent_a": {}}"#).unwrap();
        assert!(load_personas(Some(&path)).is_err());
    }

    #[test]
    fn test_llm_provider_requires_prompt_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("participant_system.md"), "You are {name}").unwrap();
        let mut config = offline_config(dir.path().to_path_buf());
        config.provider = Provider::OpenAI;
        config.openai_api_key = Some("test-openai-key".to_string());

        let err = build_services(&config).err().unwrap();
        assert!(err.to_string().contains("participant_turn.md"));
    }

    #[tokio::test]
    async fn test_offline_orchestrator_runs_without_prompts() {
        let config = offline_config(PathBuf::from("/definitely/not/here"));
        let sink = Arc::new(MemorySink::new());
        let orchestrator = build_orchestrator(&config, sink.clone()).unwrap();

        let outcome = orchestrator
            .run("Is open source software a public good?", Some(11))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(sink.transcripts().await.len(), 1);
    }
}
