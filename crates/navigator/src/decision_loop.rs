//! The bounded decision loop - core navigation engine

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use srnav_config::NavigatorConfig;
use srnav_screen::{ReaderSession, ScreenReader};

use crate::context::ContextBuilder;
use crate::decision::{ActionDecision, ActionKind};
use crate::gate::{ActionGate, AutoApprove, GateVerdict};
use crate::memory::{ActionOutcome, ActionRecord, MemoryBuffer};
use crate::oracle::DecisionOracle;
use crate::plan::TaskPlan;

/// Confidence recorded for findings whose decision carried none
pub const DEFAULT_FINDING_CONFIDENCE: u8 = 50;

/// Loop parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub max_steps: usize,
    pub observation_capacity: usize,
    pub action_capacity: usize,
    pub context_observations: usize,
    pub context_actions: usize,
    pub settle_delay: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_config(&NavigatorConfig::default())
    }
}

impl LoopConfig {
    pub fn from_config(config: &NavigatorConfig) -> Self {
        Self {
            max_steps: config.max_steps as usize,
            observation_capacity: config.observation_capacity,
            action_capacity: config.action_capacity,
            context_observations: config.context_observations,
            context_actions: config.context_actions,
            settle_delay: config.settle_delay(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Running,
    Completed,
    Failed,
    Exhausted,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Running => "running",
            LoopState::Completed => "completed",
            LoopState::Failed => "failed",
            LoopState::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task-relevant information the oracle pulled out of an observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub content: String,
    pub source_observation_text: String,
    pub step_index: usize,
    pub confidence: u8,
}

/// What a finished loop hands back
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub final_state: LoopState,
    pub steps_used: usize,
    pub max_steps: usize,
    pub findings: Vec<Finding>,
    /// One line per step, in order
    pub action_log: Vec<String>,
    pub memory: MemoryBuffer,
    pub last_decision: Option<ActionDecision>,
}

impl LoopOutcome {
    /// Last `n` action log lines, oldest first
    pub fn action_log_tail(&self, n: usize) -> &[String] {
        let skip = self.action_log.len().saturating_sub(n);
        &self.action_log[skip..]
    }
}

/// Drives one reader session until a terminal decision or the step budget
pub struct DecisionLoop {
    config: LoopConfig,
    context: ContextBuilder,
    gate: Arc<dyn ActionGate>,
}

impl DecisionLoop {
    pub fn new(config: LoopConfig) -> Self {
        let context = ContextBuilder::new(config.context_observations, config.context_actions);
        Self {
            config,
            context,
            gate: Arc::new(AutoApprove),
        }
    }

    /// Ask `gate` before every `activate` and `type`
    pub fn with_gate(mut self, gate: Arc<dyn ActionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run to completion. Driver and oracle failures are recorded, never
    /// returned.
    pub async fn run<R, O>(
        &self,
        session: &ReaderSession<R>,
        oracle: &O,
        objective: &str,
        plan: Option<&TaskPlan>,
    ) -> LoopOutcome
    where
        R: ScreenReader,
        O: DecisionOracle + ?Sized,
    {
        let max_steps = self.config.max_steps;
        let mut memory =
            MemoryBuffer::new(self.config.observation_capacity, self.config.action_capacity);
        let mut findings: Vec<Finding> = Vec::new();
        let mut action_log: Vec<String> = Vec::new();
        let mut last_decision = None;
        let mut state = LoopState::Running;
        let mut step = 0;

        info!("◆ Navigating: {} (budget {} steps)", objective, max_steps);

        while state == LoopState::Running && step < max_steps {
            let text = match session.read_current().await {
                Ok(text) => text,
                Err(e) => {
                    warn!("◆ Step {}: read failed: {}", step, e);
                    let record = ActionRecord::failure(step, e.to_string());
                    action_log.push(record.to_string());
                    memory.record_action(record);
                    step += 1;
                    continue;
                }
            };

            let observation = memory.record_observation(text, step);
            debug!(
                "◆ Step {}: heard {:?}{}",
                step,
                observation.text,
                if observation.first_seen { "" } else { " (repeat)" }
            );

            let context =
                self.context
                    .build(objective, plan, &memory, &findings, &observation, max_steps);

            let (decision, oracle_note) = match oracle.decide(&context).await {
                Ok(decision) => (decision, None),
                Err(e) => {
                    warn!("◆ Step {}: {}; moving on", step, e);
                    (ActionDecision::fallback(), Some(format!("oracle error: {}", e)))
                }
            };

            if let Some(info) = decision.finding_text() {
                debug!("◆ Step {}: finding {:?}", step, info);
                findings.push(Finding {
                    content: info.to_string(),
                    source_observation_text: observation.text.clone(),
                    step_index: step,
                    confidence: decision.confidence.unwrap_or(DEFAULT_FINDING_CONFIDENCE),
                });
            }

            let mut record = self.dispatch(session, step, &decision).await;
            if let Some(note) = oracle_note {
                record = record.with_note(note);
            }
            action_log.push(record.to_string());
            memory.record_action(record);

            state = match decision.action {
                ActionKind::Complete => LoopState::Completed,
                ActionKind::Failed => LoopState::Failed,
                _ => LoopState::Running,
            };
            last_decision = Some(decision);
            step += 1;
        }

        if state == LoopState::Running {
            state = LoopState::Exhausted;
        }

        info!(
            "◆ Loop finished: {} after {} of {} steps, {} findings",
            state,
            step,
            max_steps,
            findings.len()
        );

        LoopOutcome {
            final_state: state,
            steps_used: step,
            max_steps,
            findings,
            action_log,
            memory,
            last_decision,
        }
    }

    async fn dispatch<R: ScreenReader>(
        &self,
        session: &ReaderSession<R>,
        step: usize,
        decision: &ActionDecision,
    ) -> ActionRecord {
        let kind = decision.action;
        let parameter = decision.parameter_text();

        if kind == ActionKind::Type && parameter.is_none() {
            debug!("◆ Step {}: type without text, nothing sent", step);
            return ActionRecord::new(step, kind, ActionOutcome::NoOp);
        }

        if kind.needs_confirmation() {
            match self.gate.review(step, decision).await {
                GateVerdict::Approve => {}
                GateVerdict::Reject => {
                    info!("◆ Step {}: {} rejected", step, kind);
                    return ActionRecord::new(step, kind, ActionOutcome::Rejected)
                        .with_parameter(parameter);
                }
                GateVerdict::Skip => {
                    info!("◆ Step {}: {} skipped, moving next", step, kind);
                    let outcome = match session.move_next().await {
                        Ok(()) => ActionOutcome::Skipped,
                        Err(e) => ActionOutcome::Failed(e.to_string()),
                    };
                    return ActionRecord::new(step, kind, outcome).with_parameter(parameter);
                }
            }
        }

        let result = match kind {
            ActionKind::Next => session.move_next().await,
            ActionKind::Previous => session.move_previous().await,
            ActionKind::Activate => session.activate().await,
            ActionKind::Type => {
                session
                    .type_text(decision.typed_text().unwrap_or_default())
                    .await
            }
            ActionKind::Wait | ActionKind::Complete | ActionKind::Failed => Ok(()),
        };

        let outcome = match result {
            Ok(()) => {
                if kind.settles() {
                    self.settle().await;
                }
                ActionOutcome::Performed
            }
            Err(e) => {
                warn!("◆ Step {}: {} failed: {}", step, kind, e);
                ActionOutcome::Failed(e.to_string())
            }
        };

        ActionRecord::new(step, kind, outcome).with_parameter(parameter)
    }

    async fn settle(&self) {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
    }
}
