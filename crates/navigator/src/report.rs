//! Result aggregation and the final task report

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{debug, warn};
use uuid::Uuid;

use srnav_provider::{Message, Provider};

use crate::decision::DecisionParseError;
use crate::decision_loop::{Finding, LoopOutcome, LoopState};
use crate::oracle::{LlmOracle, OracleError};
use crate::plan::TaskPlan;

/// Default trailing window handed to the summarizer
pub const DEFAULT_SUMMARY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Completed,
    Partial,
    Failed,
}

impl Classification {
    /// Classification implied by the loop's end state alone
    pub fn from_outcome(state: LoopState, findings: usize) -> Self {
        match state {
            LoopState::Completed => Classification::Completed,
            LoopState::Failed => Classification::Failed,
            LoopState::Exhausted | LoopState::Running if findings > 0 => Classification::Partial,
            LoopState::Exhausted | LoopState::Running => Classification::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Completed => "completed",
            Classification::Partial => "partial",
            Classification::Failed => "failed",
        }
    }
}

/// Natural-language wrap-up of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub summary: String,
    pub classification: Classification,
}

/// Fixed trailing window of a run, the summarizer's only input
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDigest {
    pub task: String,
    pub final_state: LoopState,
    pub steps_used: usize,
    pub max_steps: usize,
    pub findings_count: usize,
    pub findings: Vec<Finding>,
    pub recent_actions: Vec<String>,
    pub recent_observations: Vec<String>,
}

impl RunDigest {
    pub fn from_outcome(task: &str, outcome: &LoopOutcome, window: usize) -> Self {
        let skip = outcome.findings.len().saturating_sub(window);
        Self {
            task: task.to_string(),
            final_state: outcome.final_state,
            steps_used: outcome.steps_used,
            max_steps: outcome.max_steps,
            findings_count: outcome.findings.len(),
            findings: outcome.findings[skip..].to_vec(),
            recent_actions: outcome.action_log_tail(window).to_vec(),
            recent_observations: outcome
                .memory
                .recent_observations(window)
                .into_iter()
                .map(|o| o.text.clone())
                .collect(),
        }
    }
}

/// Summarizes a finished run
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, digest: &RunDigest) -> Result<RunSummary, OracleError>;
}

const SUMMARY_PROMPT: &str = r#"You review a finished screen-reader navigation run. You get the task, how
the run ended, the findings and the last actions. Reply with one JSON object
and nothing else:
{"summary": "two or three sentences answering the task from the findings",
 "classification": "completed|partial|failed"}"#;

#[async_trait]
impl<P: Provider> Summarizer for LlmOracle<P> {
    async fn summarize(&self, digest: &RunDigest) -> Result<RunSummary, OracleError> {
        let body = serde_json::to_string_pretty(digest)
            .map_err(|e| OracleError::Parse(DecisionParseError::InvalidJson(e.to_string())))?;
        let value = self
            .complete_json(vec![Message::system(SUMMARY_PROMPT), Message::user(body)])
            .await?;
        if !value.is_object() {
            return Err(DecisionParseError::NotAnObject.into());
        }

        let summary: RunSummary = serde_json::from_value(value)
            .map_err(|e| OracleError::Parse(DecisionParseError::InvalidJson(e.to_string())))?;
        if summary.summary.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(summary)
    }
}

/// Turns a loop outcome into a summary; never fails
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    window: usize,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_WINDOW)
    }
}

impl ResultAggregator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// At most one summarizer call; the template covers everything else
    pub async fn aggregate<S: Summarizer + ?Sized>(
        &self,
        task: &str,
        outcome: &LoopOutcome,
        summarizer: Option<&S>,
    ) -> RunSummary {
        let Some(summarizer) = summarizer else {
            return Self::templated(outcome);
        };

        let digest = RunDigest::from_outcome(task, outcome, self.window);
        match summarizer.summarize(&digest).await {
            Ok(summary) => {
                debug!("◆ Summary classified {}", summary.classification.as_str());
                summary
            }
            Err(e) => {
                warn!("◆ Summary failed: {}; using template", e);
                Self::templated(outcome)
            }
        }
    }

    pub fn templated(outcome: &LoopOutcome) -> RunSummary {
        let findings = outcome.findings.len();
        let mut summary = format!(
            "Navigation {} after {} of {} steps with {} finding{}.",
            outcome.final_state,
            outcome.steps_used,
            outcome.max_steps,
            findings,
            if findings == 1 { "" } else { "s" }
        );
        if let Some(last) = outcome.findings.last() {
            let _ = write!(summary, " Last finding: {}", last.content);
        }

        RunSummary {
            summary,
            classification: Classification::from_outcome(outcome.final_state, findings),
        }
    }
}

/// Number of action log lines carried in a report
pub const ACTION_LOG_TAIL: usize = 10;

/// Everything a caller learns about a task run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub run_id: Uuid,
    pub task: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub final_state: LoopState,
    pub steps_used: usize,
    pub max_steps: usize,
    pub findings: Vec<Finding>,
    pub action_log_tail: Vec<String>,
    pub summary: String,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<TaskPlan>,
}

impl TaskReport {
    pub fn new(
        task: &str,
        started_at: DateTime<Local>,
        outcome: &LoopOutcome,
        summary: RunSummary,
        plan: Option<TaskPlan>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task: task.to_string(),
            started_at,
            finished_at: Local::now(),
            final_state: outcome.final_state,
            steps_used: outcome.steps_used,
            max_steps: outcome.max_steps,
            findings: outcome.findings.clone(),
            action_log_tail: outcome.action_log_tail(ACTION_LOG_TAIL).to_vec(),
            summary: summary.summary,
            classification: summary.classification,
            plan,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Console rendering
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "◆ TASK: {}", self.task);
        let _ = writeln!(
            out,
            "◆ RESULT: {} ({}), {}/{} steps",
            self.classification.as_str().to_uppercase(),
            self.final_state,
            self.steps_used,
            self.max_steps
        );
        if let Some(plan) = &self.plan {
            let _ = writeln!(out, "◆ PLAN: {}", plan.strategy);
        }
        let _ = writeln!(out, "\n{}", self.summary);

        if !self.findings.is_empty() {
            let _ = writeln!(out, "\nFindings:");
            for finding in &self.findings {
                let _ = writeln!(
                    out,
                    "  [step {}, {}%] {}",
                    finding.step_index, finding.confidence, finding.content
                );
            }
        }

        if !self.action_log_tail.is_empty() {
            let _ = writeln!(out, "\nLast actions:");
            for line in &self.action_log_tail {
                let _ = writeln!(out, "  {}", line);
            }
        }

        let _ = write!(out, "\nrun {}", self.run_id);
        out
    }
}
