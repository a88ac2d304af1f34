//! Decision oracle backed by a chat-completion provider

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, trace};

use srnav_config::NavigatorConfig;
use srnav_provider::{ChatParams, Message, Provider, ProviderError, ResponseFormat};

use crate::context::{ContextBuilder, DecisionContext};
use crate::decision::{ActionDecision, DecisionParseError};

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("ORACLE UNAVAILABLE: {0}")]
    Provider(#[from] ProviderError),

    #[error("ORACLE RETURNED NOTHING")]
    EmptyResponse,

    #[error("ORACLE REPLY UNUSABLE: {0}")]
    Parse(#[from] DecisionParseError),
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// Chooses the next action from a step's context
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, context: &DecisionContext) -> Result<ActionDecision>;

    /// False when the oracle cannot possibly answer (e.g. no API key)
    fn is_configured(&self) -> bool {
        true
    }
}

static SURROUNDING_FENCE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\A```[\w-]*[ \t]*\r?\n?(.*)```\z").ok());

static EMBEDDED_FENCE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w-]*[ \t]*\r?\n?(.*?)```").ok());

/// Remove a ```` ```json ```` or ```` ``` ```` fence wrapping the whole reply.
///
/// Backticks inside the payload are kept. Text that is not wrapped in a
/// closed fence is returned trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    SURROUNDING_FENCE_RE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map_or(text, |inner| inner.as_str().trim())
}

/// First fenced block in a reply that wraps it in prose
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    EMBEDDED_FENCE_RE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|inner| inner.as_str().trim())
}

/// Parse a reply as JSON: as sent, then without a surrounding fence, then
/// the first fenced block inside prose.
pub fn parse_json_reply(text: &str) -> std::result::Result<Value, DecisionParseError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let error = match serde_json::from_str(strip_code_fences(trimmed)) {
        Ok(value) => return Ok(value),
        Err(e) => DecisionParseError::InvalidJson(e.to_string()),
    };

    extract_fenced_block(trimmed)
        .and_then(|block| serde_json::from_str(block).ok())
        .ok_or(error)
}

/// [`DecisionOracle`] over any [`Provider`]
pub struct LlmOracle<P: Provider> {
    provider: P,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl<P: Provider> LlmOracle<P> {
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        let defaults = ChatParams::default();
        Self {
            provider,
            model: model.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    pub fn from_config(provider: P, config: &NavigatorConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// One round-trip whose reply must be a JSON document
    pub(crate) async fn complete_json(&self, messages: Vec<Message>) -> Result<Value> {
        let params = ChatParams {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat::JsonObject,
        };

        let response = self.provider.chat(params).await?;
        let text = response.text_content().ok_or(OracleError::EmptyResponse)?;
        trace!("◆ Oracle reply: {}", text);

        Ok(parse_json_reply(text)?)
    }
}

#[async_trait]
impl<P: Provider> DecisionOracle for LlmOracle<P> {
    async fn decide(&self, context: &DecisionContext) -> Result<ActionDecision> {
        let messages = ContextBuilder::build_messages(context);
        let value = self.complete_json(messages).await?;
        let decision = ActionDecision::from_value(&value)?;
        debug!(
            "◆ Step {} decision: {} ({})",
            context.step_index, decision.action, decision.reasoning
        );
        Ok(decision)
    }

    fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }
}
