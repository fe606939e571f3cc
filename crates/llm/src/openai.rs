//! OpenAI-Compatible Provider
//!
//! Implementation of the ReasoningProvider trait for any chat-completions
//! endpoint that speaks the OpenAI wire format (OpenAI, DeepSeek, vLLM,
//! Ollama's `/v1` endpoint, ...).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{
    missing_api_key_error, parse_http_error, parse_retry_after, ReasoningProvider,
};
use super::types::{
    LlmError, LlmResponse, LlmResult, Message, MessageRole, ProviderConfig, UsageStats,
};
use crate::http_client::build_http_client;

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible provider
pub struct OpenAICompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAICompatibleProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(
            config.proxy.as_deref(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )?;
        Ok(Self { config, client })
    }

    /// Get the API endpoint URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    /// Whether an API key is required: only the public OpenAI endpoint
    /// refuses anonymous requests outright.
    fn requires_api_key(&self) -> bool {
        self.config.base_url.is_none()
    }

    /// Build the request body for the API
    fn build_request_body(&self, messages: &[Message], system: Option<&str>) -> serde_json::Value {
        let mut openai_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system {
            openai_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for msg in messages {
            let role = match msg.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            openai_messages.push(serde_json::json!({
                "role": role,
                "content": msg.content
            }));
        }

        serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
            "messages": openai_messages,
        })
    }

    /// Convert the wire response into an `LlmResponse`
    fn parse_response(&self, response: OpenAIResponse) -> LlmResult<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError {
                message: "response contained no choices".to_string(),
            })?;

        let content = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: response.model,
            finish_reason: choice.finish_reason,
            usage: response.usage.map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[async_trait]
impl ReasoningProvider for OpenAICompatibleProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
    ) -> LlmResult<LlmResponse> {
        let api_key = self.config.resolve_api_key();
        if api_key.is_none() && self.requires_api_key() {
            return Err(missing_api_key_error(self.name()));
        }

        let body = self.build_request_body(&messages, system.as_deref());

        let mut request = self
            .client
            .post(self.base_url())
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        tracing::debug!(
            provider = self.name(),
            model = %self.config.model,
            messages = messages.len(),
            "sending completion request"
        );

        let response = request.send().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(
            response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok()),
        );
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, self.name(), retry_after));
        }

        let openai_response: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        self.parse_response(openai_response)
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
