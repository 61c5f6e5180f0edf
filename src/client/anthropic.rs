//! Anthropic Messages API client.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::model::{ChatMessage, LanguageModel, ModelReply};
use crate::config::{ANTHROPIC_API_KEY_VAR, AnthropicConfig};
use crate::error::{McpError, McpResult};
use crate::mcp::types::Tool;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout_seconds: u64,
}

impl AnthropicClient {
    pub fn new(config: &AnthropicConfig) -> McpResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                McpError::Configuration(format!(
                    "{} environment variable not set",
                    ANTHROPIC_API_KEY_VAR
                ))
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn handle_error_response(status: reqwest::StatusCode, body: &str) -> McpError {
        if let Ok(error_resp) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            McpError::Model(format!(
                "Anthropic error ({}): {}",
                error_resp.error.error_type, error_resp.error.message
            ))
        } else {
            McpError::Model(format!("HTTP {}: {}", status, body))
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> McpError {
        if err.is_timeout() {
            McpError::Timeout {
                operation: "model completion".to_string(),
                seconds: self.timeout_seconds,
            }
        } else {
            McpError::Network(err)
        }
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> McpResult<ModelReply> {
        let url = format!("{}/messages", self.base_url);

        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
            tools: tools.iter().map(AnthropicTool::from_mcp).collect::<McpResult<_>>()?,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| McpError::Configuration("Invalid API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        debug!(
            "Requesting completion from {} with {} message(s)",
            self.model,
            messages.len()
        );

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::handle_error_response(status, &body));
        }

        let reply: ModelReply = response.json().await.map_err(|e| self.transport_error(e))?;
        debug!("Model stop reason: {:?}", reply.stop_reason);
        Ok(reply)
    }
}

// --- Request Types ---

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

impl AnthropicTool {
    fn from_mcp(tool: &Tool) -> McpResult<Self> {
        Ok(Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: serde_json::to_value(&tool.input_schema)?,
        })
    }
}

// --- Error Types ---

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
