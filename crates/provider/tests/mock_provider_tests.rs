//! Mock Provider Tests
//!
//! The Provider trait mocked with mockall, as the navigator crate does.

use async_trait::async_trait;
use mockall::mock;
use srnav_provider::{ChatParams, ChatResponse, Message, Provider, ProviderError, ResponseFormat};
use std::sync::Arc;

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

#[tokio::test]
async fn test_mock_provider_chat_returns_success() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Ok(ChatResponse::text("{\"action\":\"next\"}")));

    let response = mock.chat(ChatParams::default()).await.unwrap();
    assert_eq!(response.text_content(), Some("{\"action\":\"next\"}"));
}

#[tokio::test]
async fn test_mock_provider_chat_returns_error() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Err(ProviderError::Api("Mock API error".to_string())));

    match mock.chat(ChatParams::default()).await {
        Err(ProviderError::Api(msg)) => assert_eq!(msg, "Mock API error"),
        _ => panic!("Expected Api error"),
    }
}

#[tokio::test]
async fn test_mock_provider_sees_params() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .withf(|params| {
            params.model == "test-model"
                && params.messages.len() == 2
                && params.messages[0].role == "system"
                && params.response_format == ResponseFormat::JsonObject
        })
        .returning(|_| Ok(ChatResponse::text("ok")));

    let params = ChatParams {
        model: "test-model".to_string(),
        messages: vec![Message::system("rules"), Message::user("context")],
        response_format: ResponseFormat::JsonObject,
        ..ChatParams::default()
    };

    assert!(mock.chat(params).await.is_ok());
}

#[tokio::test]
async fn test_arc_provider_delegates() {
    let mut mock = MockProvider::new();
    mock.expect_is_configured().times(1).returning(|| true);
    mock.expect_default_model()
        .times(1)
        .returning(|| "mock-model".to_string());
    mock.expect_chat()
        .times(1)
        .returning(|_| Err(ProviderError::RateLimited));

    let shared = Arc::new(mock);
    assert!(shared.is_configured());
    assert_eq!(shared.default_model(), "mock-model");
    assert!(matches!(
        shared.chat(ChatParams::default()).await,
        Err(ProviderError::RateLimited)
    ));
}

// Test using a struct that holds a Provider trait object
struct ProviderConsumer {
    provider: Box<dyn Provider>,
}

impl ProviderConsumer {
    async fn ask(&self, message: &str) -> Result<String, ProviderError> {
        let params = ChatParams {
            messages: vec![Message::user(message)],
            ..ChatParams::default()
        };
        let response = self.provider.chat(params).await?;
        Ok(response.content.unwrap_or_default())
    }
}

#[tokio::test]
async fn test_mock_provider_in_consumer() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Ok(ChatResponse::text("Processed!")));

    let consumer = ProviderConsumer {
        provider: Box::new(mock),
    };
    assert_eq!(consumer.ask("Hello").await.unwrap(), "Processed!");
}
