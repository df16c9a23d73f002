use debate_core::OrchestratorConfig;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the backends that can generate arguments and scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    #[value(name = "openai")]
    OpenAI,
    Gemini,
    /// Scripted participants and the heuristic judge; no network access.
    Offline,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "offline" => Ok(Self::Offline),
            other => Err(format!("'{other}' is not one of openai, gemini, offline")),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub transcript_dir: PathBuf,
    pub turn_timeout: Duration,
    pub scoring_timeout: Duration,
    pub sink_timeout: Duration,
    pub context_window: usize,
    pub personas_path: Option<PathBuf>,
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_secs(name: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs = parse_var(name, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "timeout must be at least one second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let provider = parse_var("DEBATE_PROVIDER", Provider::Offline)?;

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));
        let transcript_dir = std::env::var("TRANSCRIPT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./logs"));

        let turn_timeout = parse_secs("TURN_TIMEOUT_SECS", 60)?;
        let scoring_timeout = parse_secs("SCORING_TIMEOUT_SECS", 30)?;
        let sink_timeout = parse_secs("SINK_TIMEOUT_SECS", 30)?;
        let context_window = parse_var("CONTEXT_WINDOW", 6usize)?;

        let personas_path = std::env::var("PERSONAS_PATH").ok().map(PathBuf::from);

        let config = Self {
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            log_level,
            prompts_path,
            transcript_dir,
            turn_timeout,
            scoring_timeout,
            sink_timeout,
            context_window,
            personas_path,
        };
        config.check_credentials()?;
        Ok(config)
    }

    /// Switches provider, re-checking that its API key is present.
    pub fn with_provider(mut self, provider: Provider) -> Result<Self, ConfigError> {
        self.provider = provider;
        self.check_credentials()?;
        Ok(self)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            turn_timeout: self.turn_timeout,
            scoring_timeout: self.scoring_timeout,
            sink_timeout: self.sink_timeout,
        }
    }

    fn check_credentials(&self) -> Result<(), ConfigError> {
        match self.provider {
            Provider::OpenAI if self.openai_api_key.is_none() => Err(ConfigError::MissingVar(
                "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
            )),
            Provider::Gemini if self.gemini_api_key.is_none() => Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("DEBATE_PROVIDER");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("CHAT_MODEL");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
            env::remove_var("TRANSCRIPT_DIR");
            env::remove_var("TURN_TIMEOUT_SECS");
            env::remove_var("SCORING_TIMEOUT_SECS");
            env::remove_var("SINK_TIMEOUT_SECS");
            env::remove_var("CONTEXT_WINDOW");
            env::remove_var("PERSONAS_PATH");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing = ConfigError::MissingVar("OPENAI_API_KEY".to_string());
        assert_eq!(
            missing.to_string(),
            "Missing environment variable: OPENAI_API_KEY"
        );

        let invalid = ConfigError::InvalidValue("CONTEXT_WINDOW".to_string(), "-3".to_string());
        assert_eq!(
            invalid.to_string(),
            "Invalid value for environment variable CONTEXT_WINDOW: -3"
        );
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::OpenAI));
        assert_eq!("gemini".parse::<Provider>(), Ok(Provider::Gemini));
        assert_eq!("OFFLINE".parse::<Provider>(), Ok(Provider::Offline));
        assert!("claude".parse::<Provider>().is_err());
        assert_eq!(Provider::Gemini.to_string(), "gemini");
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::Offline);
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
        assert_eq!(config.transcript_dir, PathBuf::from("./logs"));
        assert_eq!(config.turn_timeout, Duration::from_secs(60));
        assert_eq!(config.scoring_timeout, Duration::from_secs(30));
        assert_eq!(config.sink_timeout, Duration::from_secs(30));
        assert_eq!(config.context_window, 6);
        assert_eq!(config.personas_path, None);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("DEBATE_PROVIDER", "openai");
            env::set_var("OPENAI_API_KEY", "custom-openai-key");
            env::set_var("CHAT_MODEL", "gpt-4o");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
            env::set_var("TRANSCRIPT_DIR", "/tmp/debates");
            env::set_var("TURN_TIMEOUT_SECS", "90");
            env::set_var("SCORING_TIMEOUT_SECS", "15");
            env::set_var("SINK_TIMEOUT_SECS", "5");
            env::set_var("CONTEXT_WINDOW", "4");
            env::set_var("PERSONAS_PATH", "/custom/personas.json");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.openai_api_key, Some("custom-openai-key".to_string()));
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
        assert_eq!(config.transcript_dir, PathBuf::from("/tmp/debates"));
        assert_eq!(config.context_window, 4);
        assert_eq!(
            config.personas_path,
            Some(PathBuf::from("/custom/personas.json"))
        );

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.turn_timeout, Duration::from_secs(90));
        assert_eq!(orchestrator.scoring_timeout, Duration::from_secs(15));
        assert_eq!(orchestrator.sink_timeout, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_config_invalid_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("DEBATE_PROVIDER", "carrier-pigeon");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "DEBATE_PROVIDER"),
            _ => panic!("Expected InvalidValue for DEBATE_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_timeout() {
        clear_env_vars();
        unsafe {
            env::set_var("TURN_TIMEOUT_SECS", "0");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TURN_TIMEOUT_SECS"),
            _ => panic!("Expected InvalidValue for TURN_TIMEOUT_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_context_window() {
        clear_env_vars();
        unsafe {
            env::set_var("CONTEXT_WINDOW", "-3");
        }

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(var, _)) if var == "CONTEXT_WINDOW"
        ));
    }

    #[test]
    #[serial]
    fn test_config_missing_openai_key() {
        clear_env_vars();
        unsafe {
            env::set_var("DEBATE_PROVIDER", "openai");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("OPENAI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_provider_override_rechecks_credentials() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");
        let err = config.clone().with_provider(Provider::Gemini).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(msg) if msg.contains("GEMINI_API_KEY")));

        let offline = config.with_provider(Provider::Offline).unwrap();
        assert_eq!(offline.provider, Provider::Offline);
    }
}
