//! Mocks shared by the navigator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use srnav_config::NavigatorConfig;
use srnav_navigator::{
    ActionDecision, ActionGate, ActionKind, DecisionContext, DecisionOracle, GateVerdict,
    LoopConfig, OracleError, PlanSynthesizer, RunDigest, RunSummary, Summarizer, SurveyDigest,
    TaskPlan,
};
use srnav_provider::{ChatParams, ChatResponse, Provider, ProviderError};
use srnav_screen::{DriverError, ReaderSession, ScreenReader};

mock! {
    pub Reader {}

    #[async_trait]
    impl ScreenReader for Reader {
        async fn start(&self) -> Result<(), DriverError>;
        async fn stop(&self) -> Result<(), DriverError>;
        async fn read_current(&self) -> Result<String, DriverError>;
        async fn move_next(&self) -> Result<(), DriverError>;
        async fn move_previous(&self) -> Result<(), DriverError>;
        async fn activate(&self) -> Result<(), DriverError>;
        async fn type_text(&self, text: &str) -> Result<(), DriverError>;
    }
}

mock! {
    pub Oracle {}

    #[async_trait]
    impl DecisionOracle for Oracle {
        async fn decide(&self, context: &DecisionContext) -> Result<ActionDecision, OracleError>;
        fn is_configured(&self) -> bool;
    }

    #[async_trait]
    impl PlanSynthesizer for Oracle {
        async fn synthesize(&self, digest: &SurveyDigest) -> Result<TaskPlan, OracleError>;
    }

    #[async_trait]
    impl Summarizer for Oracle {
        async fn summarize(&self, digest: &RunDigest) -> Result<RunSummary, OracleError>;
    }
}

mock! {
    pub Gate {}

    #[async_trait]
    impl ActionGate for Gate {
        async fn review(&self, step: usize, decision: &ActionDecision) -> GateVerdict;
    }
}

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

/// Phrase read once the script runs out
pub const END_OF_PAGE: &str = "End of page";

/// Reader that starts cleanly and speaks `script` in order
pub fn scripted_reader(script: &[&str]) -> MockReader {
    let queue: Arc<Mutex<VecDeque<String>>> =
        Arc::new(Mutex::new(script.iter().map(|s| s.to_string()).collect()));

    let mut reader = MockReader::new();
    reader.expect_start().returning(|| Ok(()));
    reader.expect_read_current().returning(move || {
        Ok(queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| END_OF_PAGE.to_string()))
    });
    reader
}

pub async fn started(reader: MockReader) -> ReaderSession<MockReader> {
    let mut session = ReaderSession::new(reader);
    session.start().await.unwrap();
    session
}

/// Loop config with no settle delay
pub fn loop_config(max_steps: usize) -> LoopConfig {
    LoopConfig::from_config(&navigator_config(max_steps))
}

pub fn navigator_config(max_steps: usize) -> NavigatorConfig {
    NavigatorConfig {
        max_steps: max_steps as u32,
        settle_delay_ms: 0,
        ..NavigatorConfig::default()
    }
}

pub fn next() -> ActionDecision {
    ActionDecision::new(ActionKind::Next, "keep looking")
}
