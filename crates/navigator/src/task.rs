//! One task from start to report

use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use srnav_config::NavigatorConfig;
use srnav_screen::{ReaderSession, ScreenReader};

use crate::decision_loop::{DecisionLoop, LoopConfig};
use crate::gate::{ActionGate, AutoApprove};
use crate::oracle::DecisionOracle;
use crate::plan::{PlanSynthesizer, Planner};
use crate::report::{ResultAggregator, Summarizer, TaskReport};
use crate::{NavigatorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Navigate straight away
    #[default]
    Direct,
    /// Survey first, then navigate with the synthesized plan
    PlanThenExecute,
}

#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task: String,
    pub mode: RunMode,
    /// Overrides the configured step budget
    pub max_steps: Option<usize>,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            mode: RunMode::Direct,
            max_steps: None,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

/// Owns the order of a run: checks, start, plan, navigate, stop, report
pub struct TaskRunner {
    config: NavigatorConfig,
    gate: Arc<dyn ActionGate>,
}

impl TaskRunner {
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            config,
            gate: Arc::new(AutoApprove),
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn ActionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    fn loop_with_budget(&self, max_steps: usize) -> DecisionLoop {
        let config = LoopConfig::from_config(&self.config).with_max_steps(max_steps);
        DecisionLoop::new(config).with_gate(self.gate.clone())
    }

    /// Run one task. Only configuration problems and a reader that will not
    /// start are returned as errors; everything after start ends in a report.
    pub async fn run<R, O>(
        &self,
        session: &mut ReaderSession<R>,
        oracle: &O,
        request: &TaskRequest,
    ) -> Result<TaskReport>
    where
        R: ScreenReader,
        O: DecisionOracle + PlanSynthesizer + Summarizer,
    {
        let task = request.task.trim();
        if task.is_empty() {
            return Err(NavigatorError::Configuration("task is empty".to_string()));
        }
        if !oracle.is_configured() {
            return Err(NavigatorError::Configuration(
                "no API key configured".to_string(),
            ));
        }
        let max_steps = request
            .max_steps
            .unwrap_or(self.config.max_steps as usize);
        if max_steps == 0 {
            return Err(NavigatorError::Configuration(
                "step budget must be at least 1".to_string(),
            ));
        }

        session.start().await?;
        let started_at = Local::now();
        info!("◆ Task started: {}", task);

        let plan = match request.mode {
            RunMode::Direct => None,
            RunMode::PlanThenExecute => {
                let survey_budget = self.config.plan_survey_steps as usize;
                let planner = Planner::new(self.loop_with_budget(survey_budget), max_steps);
                Some(planner.plan(&*session, oracle, oracle, task).await)
            }
        };

        let budget = plan.as_ref().map_or(max_steps, |p| p.max_steps);
        let outcome = self
            .loop_with_budget(budget)
            .run(&*session, oracle, task, plan.as_ref())
            .await;

        if let Err(e) = session.stop().await {
            warn!("◆ Teardown failed: {}", e);
        }

        let summary = ResultAggregator::new(self.config.summary_window)
            .aggregate(task, &outcome, Some(oracle))
            .await;

        let report = TaskReport::new(task, started_at, &outcome, summary, plan);
        info!(
            "◆ Task finished: {} in {} steps",
            report.classification.as_str(),
            report.steps_used
        );
        Ok(report)
    }
}
