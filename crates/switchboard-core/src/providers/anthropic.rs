//! Anthropic Claude provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{LlmProvider, ProviderError, build_client, status_error};

pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        }
    }

    /// Pull the text of the first content block
    fn first_text(resp: AnthropicApiResponse) -> Result<String, ProviderError> {
        match resp.content.into_iter().next() {
            Some(AnthropicBlock::Text { text }) => Ok(text),
            Some(AnthropicBlock::Other) => Err(ProviderError::MalformedResponse(
                "first content block is not text".to_string(),
            )),
            None => Err(ProviderError::MalformedResponse(format!(
                "response had no content (stop_reason={})",
                resp.stop_reason.as_deref().unwrap_or("none")
            ))),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn display_name(&self) -> &str {
        "Claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let url = format!("{}/v1/messages", self.base_url);
        debug!(
            "Anthropic request: model={}, max_tokens={}, prompt_chars={}",
            self.model,
            self.max_tokens,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.trim())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let raw = response.text().await?;
        let api_response: AnthropicApiResponse = serde_json::from_str(&raw).map_err(|e| {
            ProviderError::MalformedResponse(format!("failed to parse Anthropic response: {}", e))
        })?;

        debug!(
            "Anthropic response: blocks={}, stop_reason={:?}",
            api_response.content.len(),
            api_response.stop_reason
        );

        Self::first_text(api_response)
    }
}

// ── Anthropic wire types ──

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str, api_key: &str) -> AnthropicProvider {
        AnthropicProvider::new(
            api_key.to_string(),
            DEFAULT_MODEL.to_string(),
            base_url.to_string(),
            DEFAULT_MAX_TOKENS,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let p = provider(DEFAULT_BASE_URL, "sk-test");
        let body = serde_json::to_value(p.request_body("hello")).unwrap();
        assert_eq!(body["model"], "claude-3-opus-20240229");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_first_text_picks_first_block() {
        let resp: AnthropicApiResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(AnthropicProvider::first_text(resp).unwrap(), "first");
    }

    #[test]
    fn test_first_text_non_text_block() {
        let resp: AnthropicApiResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "tool_use", "id": "tu_1", "name": "x", "input": {}}],
            "stop_reason": "tool_use"
        }))
        .unwrap();
        assert!(matches!(
            AnthropicProvider::first_text(resp),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_first_text_empty_content() {
        let resp: AnthropicApiResponse = serde_json::from_value(serde_json::json!({
            "content": [],
            "stop_reason": "max_tokens"
        }))
        .unwrap();
        let err = AnthropicProvider::first_text(resp).unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let p = provider("https://api.anthropic.com/", "sk-test");
        assert_eq!(p.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_anthropic_provider_debug_hides_key() {
        let p = provider(DEFAULT_BASE_URL, "sk-ant-secret");
        let debug = format!("{:?}", p);
        assert!(!debug.contains("sk-ant-secret"));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "claude-3-opus-20240229",
                "max_tokens": 1000,
                "messages": [{"role": "user", "content": "Please solve this equation"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "msg_1",
                    "type": "message",
                    "role": "assistant",
                    "content": [{"type": "text", "text": "x = 4"}],
                    "stop_reason": "end_turn",
                    "usage": {"input_tokens": 12, "output_tokens": 3}
                }"#,
            )
            .create_async()
            .await;

        let p = provider(&server.url(), "test-key");
        let text = p.generate("Please solve this equation").await.unwrap();
        assert_eq!(text, "x = 4");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"type":"error","error":{"type":"authentication_error"}}"#)
            .create_async()
            .await;

        let p = provider(&server.url(), "bad-key");
        let err = p.generate("hello").await.unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert!(body.contains("authentication_error"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_unparseable_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let p = provider(&server.url(), "test-key");
        assert!(matches!(
            p.generate("hello").await,
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_transport_failure() {
        let p = provider("http://127.0.0.1:1", "test-key");
        assert!(matches!(
            p.generate("hello").await,
            Err(ProviderError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_missing_key_skips_network() {
        let p = provider("http://127.0.0.1:1", "  ");
        assert!(matches!(
            p.generate("hello").await,
            Err(ProviderError::MissingApiKey)
        ));
    }
}
