//! srnav configuration
//!
//! Loads and saves navigator parameters, chat-completion credentials and the
//! screen-reader façade address from `~/.srnav/config.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, reports_dir};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG IO ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG PARSE ERROR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NO API KEY CONFIGURED: set one in {0}")]
    MissingApiKey(PathBuf),

    #[error("INVALID CONFIG: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Credentials for one chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// All known chat-completion endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub vllm: ProviderConfig,
}

/// Decision loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatorConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_observation_capacity")]
    pub observation_capacity: usize,
    #[serde(default = "default_action_capacity")]
    pub action_capacity: usize,
    #[serde(default = "default_context_observations")]
    pub context_observations: usize,
    #[serde(default = "default_context_actions")]
    pub context_actions: usize,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,
    #[serde(default = "default_plan_survey_steps")]
    pub plan_survey_steps: u32,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_steps: default_max_steps(),
            observation_capacity: default_observation_capacity(),
            action_capacity: default_action_capacity(),
            context_observations: default_context_observations(),
            context_actions: default_context_actions(),
            settle_delay_ms: default_settle_delay_ms(),
            summary_window: default_summary_window(),
            plan_survey_steps: default_plan_survey_steps(),
        }
    }
}

impl NavigatorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_steps() -> u32 {
    30
}

fn default_observation_capacity() -> usize {
    16
}

fn default_action_capacity() -> usize {
    16
}

fn default_context_observations() -> usize {
    12
}

fn default_context_actions() -> usize {
    6
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_summary_window() -> usize {
    10
}

fn default_plan_survey_steps() -> u32 {
    8
}

/// Screen-reader façade connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenReaderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScreenReaderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScreenReaderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub navigator: NavigatorConfig,
    #[serde(default)]
    pub screen_reader: ScreenReaderConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from a specific location, falling back to defaults when absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ No config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("◆ Loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to a specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// First configured API key: openrouter, then openai, then vllm
    pub fn api_key(&self) -> Option<String> {
        [
            &self.providers.openrouter,
            &self.providers.openai,
            &self.providers.vllm,
        ]
        .into_iter()
        .map(|p| p.api_key.clone())
        .find(|key| !key.is_empty())
    }

    /// Base URL matching the key returned by [`Config::api_key`]
    pub fn api_base(&self) -> Option<String> {
        if !self.providers.openrouter.api_key.is_empty() {
            return self
                .providers
                .openrouter
                .api_base
                .clone()
                .or_else(|| Some(OPENROUTER_API_BASE.to_string()));
        }

        if !self.providers.openai.api_key.is_empty() {
            return self
                .providers
                .openai
                .api_base
                .clone()
                .or_else(|| Some(OPENAI_API_BASE.to_string()));
        }

        match self.providers.vllm.api_base {
            Some(ref api_base) if !api_base.is_empty() => Some(api_base.clone()),
            _ => None,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn model(&self) -> String {
        self.navigator.model.clone()
    }

    /// Reject configurations the navigator cannot start with
    pub fn validate(&self) -> Result<()> {
        if !self.has_api_key() {
            return Err(ConfigError::MissingApiKey(config_path()));
        }
        if self.navigator.max_steps == 0 {
            return Err(ConfigError::Invalid("navigator.max_steps must be > 0".into()));
        }
        if self.navigator.observation_capacity == 0 || self.navigator.action_capacity == 0 {
            return Err(ConfigError::Invalid(
                "memory capacities must be > 0".into(),
            ));
        }
        if self.screen_reader.base_url.is_empty() {
            return Err(ConfigError::Invalid("screen_reader.base_url is empty".into()));
        }
        Ok(())
    }
}

/// Write a default config if none exists, then load it
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("◆ Config already present at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("◆ Config created at {:?}", config_path);
    }

    let reports = reports_dir();
    tokio::fs::create_dir_all(&reports).await?;
    info!("◆ Reports directory ready at {:?}", reports);

    Config::load().await
}
