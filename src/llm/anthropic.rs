//! Anthropic Messages API provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::with_retries;
use super::{api_error, http_client, LlmConfig, LlmError, LlmProvider};

pub const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    retries: u32,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig, api_key: String) -> Self {
        Self {
            client: http_client(config.timeout),
            endpoint: config
                .endpoint
                .as_deref()
                .unwrap_or(ANTHROPIC_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            retries: config.retries,
        }
    }

    async fn call_anthropic(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/messages", self.endpoint);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Calling Anthropic API at {} with model {}", url, self.model);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let result: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text: String = result
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse("anthropic".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        with_retries("anthropic", self.retries, || self.call_anthropic(prompt)).await
    }
}
