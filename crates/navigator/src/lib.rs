//! Screen-reader navigation driven by a language model
//!
//! A bounded decision loop: read what the screen reader says, ask the
//! oracle what to do, do it, remember it. Stops on a terminal decision or
//! when the step budget runs out.

use thiserror::Error;

pub mod context;
pub mod decision;
pub mod decision_loop;
pub mod gate;
pub mod memory;
pub mod oracle;
pub mod plan;
pub mod report;
pub mod task;

pub use context::{ContextBuilder, DecisionContext};
pub use decision::{ActionDecision, ActionKind, DecisionParseError};
pub use decision_loop::{DecisionLoop, Finding, LoopConfig, LoopOutcome, LoopState};
pub use gate::{ActionGate, AutoApprove, GateVerdict};
pub use memory::{ActionOutcome, ActionRecord, MemoryBuffer, MemoryEntry, Observation};
pub use oracle::{
    extract_fenced_block, parse_json_reply, strip_code_fences, DecisionOracle, LlmOracle,
    OracleError,
};
pub use plan::{PlanSynthesizer, Planner, SurveyDigest, TaskPlan};
pub use report::{Classification, ResultAggregator, RunDigest, RunSummary, Summarizer, TaskReport};
pub use task::{RunMode, TaskRequest, TaskRunner};

/// Errors that stop a task before its loop runs
#[derive(Error, Debug)]
pub enum NavigatorError {
    #[error("◆ CONFIGURATION ERROR: {0}")]
    Configuration(String),

    #[error("◆ READER FAILED TO START: {0}")]
    SessionStart(#[from] srnav_screen::DriverError),
}

impl From<srnav_config::ConfigError> for NavigatorError {
    fn from(err: srnav_config::ConfigError) -> Self {
        NavigatorError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavigatorError>;
