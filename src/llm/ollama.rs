//! Ollama `/api/generate` provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::with_retries;
use super::{api_error, http_client, LlmConfig, LlmError, LlmProvider};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig, endpoint: String) -> Self {
        Self {
            client: http_client(config.timeout),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            retries: config.retries,
        }
    }

    async fn call_ollama(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_output_tokens,
            },
        };

        debug!("Calling Ollama API at {} with model {}", url, self.model);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let result: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if result.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse("ollama".to_string()));
        }
        Ok(result.response)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        with_retries("ollama", self.retries, || self.call_ollama(prompt)).await
    }
}
