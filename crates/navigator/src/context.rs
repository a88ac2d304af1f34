//! Context builder for assembling oracle prompts

use chrono::Local;
use serde::Serialize;

use srnav_config::NavigatorConfig;
use srnav_provider::Message;

use crate::decision_loop::Finding;
use crate::memory::{MemoryBuffer, Observation};
use crate::plan::TaskPlan;

/// Everything the oracle sees for one step; sent as pretty JSON
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContext {
    pub objective: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<TaskPlan>,
    pub step_index: usize,
    pub max_steps: usize,
    pub steps_remaining: usize,
    pub current_observation: String,
    /// The current phrase was already heard earlier in this run
    pub is_repeat: bool,
    pub recent_actions: Vec<String>,
    pub recent_observations: Vec<Observation>,
    pub recent_findings: Vec<Finding>,
    pub findings_count: usize,
}

/// Builds [`DecisionContext`]s and the chat messages that carry them
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    observation_window: usize,
    action_window: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(12, 6)
    }
}

impl ContextBuilder {
    pub fn new(observation_window: usize, action_window: usize) -> Self {
        Self {
            observation_window,
            action_window,
        }
    }

    pub fn from_config(config: &NavigatorConfig) -> Self {
        Self::new(config.context_observations, config.context_actions)
    }

    pub fn build(
        &self,
        objective: &str,
        plan: Option<&TaskPlan>,
        memory: &MemoryBuffer,
        findings: &[Finding],
        current: &Observation,
        max_steps: usize,
    ) -> DecisionContext {
        let finding_skip = findings.len().saturating_sub(self.observation_window);

        DecisionContext {
            objective: objective.to_string(),
            plan: plan.cloned(),
            step_index: current.step_index,
            max_steps,
            steps_remaining: max_steps.saturating_sub(current.step_index + 1),
            current_observation: current.text.clone(),
            is_repeat: !current.first_seen,
            recent_actions: memory
                .recent_actions(self.action_window)
                .into_iter()
                .map(|a| a.to_string())
                .collect(),
            recent_observations: memory
                .recent_observations(self.observation_window)
                .into_iter()
                .cloned()
                .collect(),
            recent_findings: findings[finding_skip..].to_vec(),
            findings_count: findings.len(),
        }
    }

    /// System prompt describing the role and the reply contract
    pub fn system_prompt() -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");

        format!(
            r#"# srnav

You control a screen reader on behalf of a user. You cannot see the screen.
Each turn you get the phrase the screen reader just spoke, your recent
actions, recent observations and what you have found so far.

## Current Time
{}

## Actions
- next: move the reader cursor to the next element
- previous: move the reader cursor to the previous element
- activate: press the element under the cursor (links, buttons, fields)
- type: type the text in "parameter" into the focused field
- wait: let the page settle without moving
- complete: the objective is achieved
- failed: the objective cannot be achieved

## Reply
Reply with one JSON object and nothing else:
{{"action": "next|previous|activate|type|wait|complete|failed",
 "parameter": "text for type, otherwise null",
 "reasoning": "one sentence",
 "confidence": 0-100,
 "extractedInfo": "task-relevant information from the current phrase, or null"}}

If "isRepeat" is true you have heard this phrase before. Consider whether you
are going in circles. When you have what the objective asks for, answer
"complete" and put it in "extractedInfo"."#,
            now
        )
    }

    /// Build the message list for one decision
    pub fn build_messages(context: &DecisionContext) -> Vec<Message> {
        let body = serde_json::to_string_pretty(context)
            .unwrap_or_else(|_| context.current_observation.clone());
        vec![Message::system(Self::system_prompt()), Message::user(body)]
    }
}
