//! Oracle decisions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Values of `extractedInfo` that mean "nothing found"
const NULL_SENTINELS: &[&str] = &["null", "none", "n/a", "nil", "undefined"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Next,
    Previous,
    Activate,
    Type,
    Wait,
    Complete,
    Failed,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Next,
        ActionKind::Previous,
        ActionKind::Activate,
        ActionKind::Type,
        ActionKind::Wait,
        ActionKind::Complete,
        ActionKind::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Next => "next",
            ActionKind::Previous => "previous",
            ActionKind::Activate => "activate",
            ActionKind::Type => "type",
            ActionKind::Wait => "wait",
            ActionKind::Complete => "complete",
            ActionKind::Failed => "failed",
        }
    }

    /// Case-insensitive; accepts the façade's `click` for `activate`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "next" => Some(ActionKind::Next),
            "previous" | "prev" => Some(ActionKind::Previous),
            "activate" | "click" => Some(ActionKind::Activate),
            "type" => Some(ActionKind::Type),
            "wait" => Some(ActionKind::Wait),
            "complete" => Some(ActionKind::Complete),
            "failed" => Some(ActionKind::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionKind::Complete | ActionKind::Failed)
    }

    /// Actions that change page state and sit behind the confirmation gate
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, ActionKind::Activate | ActionKind::Type)
    }

    /// Actions followed by the settle delay
    pub fn settles(&self) -> bool {
        matches!(self, ActionKind::Activate | ActionKind::Type | ActionKind::Wait)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionParseError {
    #[error("invalid decision json: {0}")]
    InvalidJson(String),

    #[error("decision is not a json object")]
    NotAnObject,

    #[error("decision has no action")]
    MissingAction,

    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// One step's structured reply from the oracle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDecision {
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_info: Option<String>,
}

impl ActionDecision {
    pub fn new(action: ActionKind, reasoning: impl Into<String>) -> Self {
        Self {
            action,
            parameter: None,
            reasoning: reasoning.into(),
            confidence: None,
            extracted_info: None,
        }
    }

    /// Substituted whenever the oracle cannot produce a usable decision
    pub fn fallback() -> Self {
        Self::new(ActionKind::Next, "fallback after oracle error")
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn with_extracted_info(mut self, info: impl Into<String>) -> Self {
        self.extracted_info = Some(info.into());
        self
    }

    /// Parse an already fence-free JSON document
    pub fn from_json_str(text: &str) -> Result<Self, DecisionParseError> {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| DecisionParseError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, DecisionParseError> {
        let obj = value.as_object().ok_or(DecisionParseError::NotAnObject)?;

        let action = match obj.get("action") {
            Some(Value::String(name)) => ActionKind::parse(name)
                .ok_or_else(|| DecisionParseError::UnknownAction(name.clone()))?,
            Some(Value::Null) | None => return Err(DecisionParseError::MissingAction),
            Some(other) => return Err(DecisionParseError::UnknownAction(other.to_string())),
        };

        let string_field = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| obj.get(*n).and_then(Value::as_str))
                .map(str::to_string)
        };

        Ok(Self {
            action,
            parameter: string_field(&["parameter", "text"]),
            reasoning: string_field(&["reasoning", "reason"]).unwrap_or_default(),
            confidence: obj.get("confidence").and_then(parse_confidence),
            extracted_info: string_field(&["extractedInfo", "extracted_info"]),
        })
    }

    /// Non-empty parameter, trimmed
    pub fn parameter_text(&self) -> Option<&str> {
        self.parameter
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Parameter exactly as sent to the reader, if it is not blank
    pub fn typed_text(&self) -> Option<&str> {
        self.parameter
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    /// Extracted info worth recording as a finding
    pub fn finding_text(&self) -> Option<&str> {
        self.extracted_info
            .as_deref()
            .map(str::trim)
            .filter(|info| !info.is_empty())
            .filter(|info| {
                !NULL_SENTINELS
                    .iter()
                    .any(|s| info.eq_ignore_ascii_case(s))
            })
    }
}

fn parse_confidence(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if raw.is_nan() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}
