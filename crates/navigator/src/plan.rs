//! Plan-then-execute: survey the screen, then turn the survey into a plan

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use srnav_provider::{Message, Provider};
use srnav_screen::{ReaderSession, ScreenReader};

use crate::decision::DecisionParseError;
use crate::decision_loop::{DecisionLoop, Finding, LoopOutcome};
use crate::oracle::{DecisionOracle, LlmOracle, OracleError};

/// Strategy used when no plan could be synthesized
pub const FALLBACK_STRATEGY: &str = "linear scan";

/// Navigation plan, fixed once produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlan {
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub target_elements: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub max_steps: usize,
    #[serde(default)]
    pub strategy: String,
}

impl TaskPlan {
    pub fn fallback(task: &str, max_steps: usize) -> Self {
        Self {
            objective: task.to_string(),
            target_elements: Vec::new(),
            ignore_patterns: Vec::new(),
            success_criteria: Vec::new(),
            max_steps,
            strategy: FALLBACK_STRATEGY.to_string(),
        }
    }

    /// Fill gaps from the task and keep the budget within `1..=cap`
    pub fn normalized(mut self, task: &str, cap: usize) -> Self {
        if self.objective.trim().is_empty() {
            self.objective = task.to_string();
        }
        if self.strategy.trim().is_empty() {
            self.strategy = FALLBACK_STRATEGY.to_string();
        }
        self.max_steps = if self.max_steps == 0 {
            cap
        } else {
            self.max_steps.min(cap)
        };
        self
    }
}

/// What the survey pass saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDigest {
    pub task: String,
    /// Distinct phrases in the order first heard
    pub observations: Vec<String>,
    pub findings: Vec<Finding>,
    pub steps_used: usize,
    pub step_budget: usize,
}

impl SurveyDigest {
    pub fn from_outcome(task: &str, outcome: &LoopOutcome) -> Self {
        let observations = outcome
            .memory
            .recent_observations(outcome.memory.observation_capacity())
            .into_iter()
            .filter(|o| o.first_seen)
            .map(|o| o.text.clone())
            .collect();

        Self {
            task: task.to_string(),
            observations,
            findings: outcome.findings.clone(),
            steps_used: outcome.steps_used,
            step_budget: outcome.max_steps,
        }
    }
}

/// Turns a survey into a [`TaskPlan`]
#[async_trait]
pub trait PlanSynthesizer: Send + Sync {
    async fn synthesize(&self, digest: &SurveyDigest) -> Result<TaskPlan, OracleError>;
}

const PLAN_PROMPT: &str = r#"You plan screen-reader navigation. You get the task and the phrases a
screen reader spoke while surveying the screen. Reply with one JSON object and
nothing else:
{"objective": "what to achieve",
 "targetElements": ["elements to look for"],
 "ignorePatterns": ["elements to move past"],
 "successCriteria": ["how to tell the task is done"],
 "maxSteps": 20,
 "strategy": "one sentence"}"#;

#[async_trait]
impl<P: Provider> PlanSynthesizer for LlmOracle<P> {
    async fn synthesize(&self, digest: &SurveyDigest) -> Result<TaskPlan, OracleError> {
        let body = serde_json::to_string_pretty(digest)
            .map_err(|e| OracleError::Parse(DecisionParseError::InvalidJson(e.to_string())))?;
        let value = self
            .complete_json(vec![Message::system(PLAN_PROMPT), Message::user(body)])
            .await?;
        if !value.is_object() {
            return Err(DecisionParseError::NotAnObject.into());
        }
        serde_json::from_value(value)
            .map_err(|e| OracleError::Parse(DecisionParseError::InvalidJson(e.to_string())))
    }
}

/// Runs the survey pass and synthesizes the plan
pub struct Planner {
    survey: DecisionLoop,
    max_steps: usize,
}

impl Planner {
    /// `survey` carries the survey budget; `max_steps` caps the plan
    pub fn new(survey: DecisionLoop, max_steps: usize) -> Self {
        Self { survey, max_steps }
    }

    pub fn survey_objective(task: &str) -> String {
        format!(
            "Survey the screen before doing this task: {}. Move through the elements and \
             note what is there. Do not activate or type. Answer complete once you know \
             enough to plan.",
            task
        )
    }

    /// Never fails; falls back to a linear scan plan
    pub async fn plan<R, O, S>(
        &self,
        session: &ReaderSession<R>,
        oracle: &O,
        synthesizer: &S,
        task: &str,
    ) -> TaskPlan
    where
        R: ScreenReader,
        O: DecisionOracle + ?Sized,
        S: PlanSynthesizer + ?Sized,
    {
        let objective = Self::survey_objective(task);
        let survey = self.survey.run(session, oracle, &objective, None).await;
        let digest = SurveyDigest::from_outcome(task, &survey);
        info!(
            "◆ Survey done: {} steps, {} distinct phrases",
            digest.steps_used,
            digest.observations.len()
        );

        match synthesizer.synthesize(&digest).await {
            Ok(plan) => {
                let plan = plan.normalized(task, self.max_steps);
                info!("◆ Plan: {} ({} steps)", plan.strategy, plan.max_steps);
                plan
            }
            Err(e) => {
                warn!("◆ Plan synthesis failed: {}; using {}", e, FALLBACK_STRATEGY);
                TaskPlan::fallback(task, self.max_steps)
            }
        }
    }
}
