//! LlmOracle over a mocked chat-completion provider

mod common;

use common::*;

use srnav_navigator::{
    ActionKind, Classification, ContextBuilder, DecisionLoop, DecisionOracle, DecisionParseError,
    LlmOracle, LoopState, MemoryBuffer, OracleError, PlanSynthesizer, ResultAggregator,
    SurveyDigest,
};
use srnav_provider::{ChatResponse, ProviderError, ResponseFormat};

fn context() -> srnav_navigator::DecisionContext {
    let mut memory = MemoryBuffer::default();
    let current = memory.record_observation("Search, edit text", 0);
    ContextBuilder::default().build("search for weather", None, &memory, &[], &current, 5)
}

fn replying(text: &'static str) -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_chat()
        .returning(move |_| Ok(ChatResponse::text(text)));
    provider.expect_is_configured().return_const(true);
    provider
}

#[tokio::test]
async fn test_decide_sends_json_request() {
    let mut provider = MockProvider::new();
    provider
        .expect_chat()
        .withf(|params| {
            params.model == "test-model"
                && params.response_format == ResponseFormat::JsonObject
                && params.messages.len() == 2
                && params.messages[1].content.contains("\"currentObservation\": \"Search, edit text\"")
        })
        .times(1)
        .returning(|_| Ok(ChatResponse::text(r#"{"action":"type","parameter":"weather"}"#)));

    let oracle = LlmOracle::new(provider, "test-model");
    let decision = oracle.decide(&context()).await.unwrap();

    assert_eq!(decision.action, ActionKind::Type);
    assert_eq!(decision.parameter_text(), Some("weather"));
}

#[tokio::test]
async fn test_decide_strips_fences() {
    let oracle = LlmOracle::new(
        replying("```json\n{\"action\": \"Click\", \"reasoning\": \"search button\", \"confidence\": 77}\n```"),
        "m",
    );
    let decision = oracle.decide(&context()).await.unwrap();
    assert_eq!(decision.action, ActionKind::Activate);
    assert_eq!(decision.confidence, Some(77));
}

#[tokio::test]
async fn test_decide_malformed_payloads() {
    let oracle = LlmOracle::new(replying("I would press next."), "m");
    assert!(matches!(
        oracle.decide(&context()).await,
        Err(OracleError::Parse(DecisionParseError::InvalidJson(_)))
    ));

    let oracle = LlmOracle::new(replying(r#"{"reasoning":"no idea"}"#), "m");
    assert!(matches!(
        oracle.decide(&context()).await,
        Err(OracleError::Parse(DecisionParseError::MissingAction))
    ));

    let oracle = LlmOracle::new(replying(r#"{"action":"scroll"}"#), "m");
    assert!(matches!(
        oracle.decide(&context()).await,
        Err(OracleError::Parse(DecisionParseError::UnknownAction(_)))
    ));
}

#[tokio::test]
async fn test_decide_empty_reply() {
    let oracle = LlmOracle::new(replying("   "), "m");
    assert!(matches!(
        oracle.decide(&context()).await,
        Err(OracleError::EmptyResponse)
    ));
}

#[tokio::test]
async fn test_decide_provider_error() {
    let mut provider = MockProvider::new();
    provider
        .expect_chat()
        .returning(|_| Err(ProviderError::RateLimited));

    let oracle = LlmOracle::new(provider, "m");
    assert!(matches!(
        oracle.decide(&context()).await,
        Err(OracleError::Provider(ProviderError::RateLimited))
    ));
}

#[tokio::test]
async fn test_is_configured_follows_provider() {
    let mut provider = MockProvider::new();
    provider.expect_is_configured().return_const(false);
    assert!(!LlmOracle::new(provider, "m").is_configured());
}

#[tokio::test]
async fn test_loop_with_malformed_oracle_moves_next() {
    let mut reader = scripted_reader(&["A", "B", "C"]);
    reader.expect_move_next().times(3).returning(|| Ok(()));
    let session = started(reader).await;

    let oracle = LlmOracle::new(replying("not json at all"), "m");
    let outcome = DecisionLoop::new(loop_config(3))
        .run(&session, &oracle, "weather", None)
        .await;

    assert_eq!(outcome.final_state, LoopState::Exhausted);
    assert_eq!(outcome.steps_used, 3);
    assert!(outcome
        .action_log
        .iter()
        .all(|line| line.contains("oracle error")));
}

#[tokio::test]
async fn test_synthesize_plan() {
    let oracle = LlmOracle::new(
        replying(
            r#"```json
{"objective":"read forecast","targetElements":["Weather"],"maxSteps":12,"strategy":"jump to weather"}
```"#,
        ),
        "m",
    );
    let digest = SurveyDigest {
        task: "weather".to_string(),
        observations: vec!["Home".to_string()],
        findings: Vec::new(),
        steps_used: 1,
        step_budget: 8,
    };

    let plan = oracle.synthesize(&digest).await.unwrap();
    assert_eq!(plan.objective, "read forecast");
    assert_eq!(plan.max_steps, 12);
    assert!(plan.success_criteria.is_empty());

    let oracle = LlmOracle::new(replying("[1, 2]"), "m");
    assert!(matches!(
        oracle.synthesize(&digest).await,
        Err(OracleError::Parse(DecisionParseError::NotAnObject))
    ));
}

#[tokio::test]
async fn test_aggregator_uses_oracle_summary() {
    let mut reader = scripted_reader(&["72°F"]);
    reader.expect_move_next().returning(|| Ok(()));
    let session = started(reader).await;

    let loop_oracle = LlmOracle::new(
        replying(r#"{"action":"complete","extractedInfo":"72°F"}"#),
        "m",
    );
    let outcome = DecisionLoop::new(loop_config(3))
        .run(&session, &loop_oracle, "weather", None)
        .await;

    let summarizer = LlmOracle::new(
        replying(r#"{"summary":"It is 72°F.","classification":"completed"}"#),
        "m",
    );
    let summary = ResultAggregator::default()
        .aggregate("weather", &outcome, Some(&summarizer))
        .await;
    assert_eq!(summary.summary, "It is 72°F.");
    assert_eq!(summary.classification, Classification::Completed);

    let broken = LlmOracle::new(replying(r#"{"summary":"","classification":"completed"}"#), "m");
    let summary = ResultAggregator::default()
        .aggregate("weather", &outcome, Some(&broken))
        .await;
    assert!(summary.summary.starts_with("Navigation completed after 1 of 3 steps"));
    assert_eq!(summary.classification, Classification::Completed);

    let summary = ResultAggregator::default()
        .aggregate::<LlmOracle<MockProvider>>("weather", &outcome, None)
        .await;
    assert!(summary.summary.contains("with 1 finding."));
}

#[tokio::test]
async fn test_decide_keeps_backticks_in_payload() {
    let oracle = LlmOracle::new(
        replying(r#"{"action":"complete","extractedInfo":"run ```npm i``` first"}"#),
        "m",
    );
    let decision = oracle.decide(&context()).await.unwrap();
    assert_eq!(decision.action, ActionKind::Complete);
    assert_eq!(decision.finding_text(), Some("run ```npm i``` first"));

    let oracle = LlmOracle::new(
        replying("```json\n{\"action\":\"complete\",\"extractedInfo\":\"cmd: ```ls```\"}\n```"),
        "m",
    );
    let decision = oracle.decide(&context()).await.unwrap();
    assert_eq!(decision.action, ActionKind::Complete);
    assert_eq!(decision.finding_text(), Some("cmd: ```ls```"));
}
