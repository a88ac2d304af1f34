//! OpenRouter / OpenAI-compatible chat completions

use crate::*;
use reqwest::Client;
use serde_json::json;

/// Client for any `/chat/completions` endpoint speaking the OpenAI dialect
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
    is_openrouter: bool,
}

impl OpenRouterProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_key = api_key.into();
        let is_openrouter = api_key.starts_with("sk-or-")
            || api_base
                .as_ref()
                .map(|b| b.contains("openrouter"))
                .unwrap_or(false);

        let api_base = api_base.unwrap_or_else(|| {
            if is_openrouter {
                "https://openrouter.ai/api/v1".to_string()
            } else {
                "https://api.openai.com/v1".to_string()
            }
        });

        let default_model = default_model.unwrap_or_else(|| {
            if is_openrouter {
                "anthropic/claude-sonnet-4".to_string()
            } else {
                "gpt-4o".to_string()
            }
        });

        Self {
            client: Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model,
            is_openrouter,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| json!({ "role": &m.role, "content": &m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        // Not every OpenRouter upstream honours response_format; the oracle
        // strips fences anyway, so only send it to OpenAI-style endpoints.
        if params.response_format == ResponseFormat::JsonObject && !self.is_openrouter {
            body["response_format"] = json!({ "type": "json_object" });
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let usage = if let Some(usage) = json["usage"].as_object() {
            let field = |name: &str| usage.get(name).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: field("prompt_tokens"),
                completion_tokens: field("completion_tokens"),
                total_tokens: field("total_tokens"),
            }
        } else {
            Usage::default()
        };

        Ok(ChatResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenRouterProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        trace!("◆ POST {}/chat/completions", self.api_base);

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }

        let json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let error = json["error"]["message"]
                .as_str()
                .unwrap_or("UNKNOWN ERROR")
                .to_string();
            return Err(ProviderError::Api(error));
        }

        let parsed = self.parse_response(json)?;
        debug!(
            "◆ Completion finished ({}), {} tokens",
            parsed.finish_reason, parsed.usage.total_tokens
        );
        Ok(parsed)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== Construction ==========

    #[test]
    fn test_new_with_openrouter_key() {
        let provider = OpenRouterProvider::new("sk-or-test123", None, None);
        assert!(provider.is_openrouter);
        assert_eq!(provider.api_base, "https://openrouter.ai/api/v1");
        assert_eq!(provider.default_model, "anthropic/claude-sonnet-4");
    }

    #[test]
    fn test_new_with_openai_key() {
        let provider = OpenRouterProvider::new("sk-openai123", None, None);
        assert!(!provider.is_openrouter);
        assert_eq!(provider.api_base, "https://api.openai.com/v1");
        assert_eq!(provider.default_model, "gpt-4o");
    }

    #[test]
    fn test_new_with_custom_openrouter_base() {
        let provider = OpenRouterProvider::new(
            "some-key",
            Some("https://custom.openrouter.ai/api/".to_string()),
            None,
        );
        assert!(provider.is_openrouter);
        assert_eq!(provider.api_base(), "https://custom.openrouter.ai/api");
    }

    #[test]
    fn test_is_configured() {
        assert!(OpenRouterProvider::new("key", None, None).is_configured());
        assert!(!OpenRouterProvider::new("", None, None).is_configured());
    }

    // ========== build_request ==========

    #[test]
    fn test_build_request_basic() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = ChatParams {
            model: "gpt-4o-mini".to_string(),
            messages: vec![Message::system("rules"), Message::user("Hello")],
            max_tokens: 256,
            temperature: 0.5,
            response_format: ResponseFormat::Text,
        };

        let request = provider.build_request(&params);

        assert_eq!(request["model"], "gpt-4o-mini");
        assert_eq!(request["max_tokens"], 256);
        assert_eq!(request["temperature"], 0.5);
        assert!(request.get("response_format").is_none());

        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "Hello");
    }

    #[test]
    fn test_build_request_empty_model_uses_default() {
        let provider = OpenRouterProvider::new("sk-or-x", None, Some("custom/model".into()));
        let request = provider.build_request(&ChatParams::default());
        assert_eq!(request["model"], "custom/model");
    }

    #[test]
    fn test_build_request_json_mode_openai() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = ChatParams {
            response_format: ResponseFormat::JsonObject,
            ..ChatParams::default()
        };
        let request = provider.build_request(&params);
        assert_eq!(request["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_build_request_json_mode_skipped_for_openrouter() {
        let provider = OpenRouterProvider::new("sk-or-test", None, None);
        let params = ChatParams {
            response_format: ResponseFormat::JsonObject,
            ..ChatParams::default()
        };
        let request = provider.build_request(&params);
        assert!(request.get("response_format").is_none());
    }

    // ========== parse_response ==========

    #[test]
    fn test_parse_response_simple() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "{\"action\":\"next\"}" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            }))
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("{\"action\":\"next\"}"));
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_missing_usage_and_finish_reason() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({ "choices": [{ "message": { "content": "hi" } }] }))
            .unwrap();
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.prompt_tokens, 0);
    }

    #[test]
    fn test_parse_response_null_content() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({ "choices": [{ "message": { "content": null } }] }))
            .unwrap();
        assert!(response.content.is_none());
    }

    #[test]
    fn test_parse_response_empty_choices() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let result = provider.parse_response(json!({ "choices": [] }));
        assert!(matches!(result, Err(ProviderError::InvalidResponse)));
    }

    #[test]
    fn test_parse_response_missing_choices() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let result = provider.parse_response(json!({ "usage": {} }));
        assert!(matches!(result, Err(ProviderError::InvalidResponse)));
    }

    #[tokio::test]
    async fn test_chat_without_key_fails_fast() {
        let provider = OpenRouterProvider::new("", Some("http://127.0.0.1:9".into()), None);
        let result = provider.chat(ChatParams::default()).await;
        assert!(matches!(result, Err(ProviderError::NoApiKey)));
    }
}
