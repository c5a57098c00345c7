//! LLM providers for structured incident extraction.
//!
//! A provider turns one assembled prompt into raw response text. Parsing and
//! validating that text is the caller's job.

mod anthropic;
mod config;
mod gemini;
mod json;
mod ollama;
mod openai;
mod prompts;
mod registry;
mod retry;
mod stub;

pub use anthropic::AnthropicProvider;
pub use config::LlmConfig;
pub use gemini::GeminiProvider;
pub use json::{parse_llm_json, JsonExtractError};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompts::{
    load_prompt, PromptError, PromptLoader, DEFAULT_PROMPT_TEMPLATE, DEFAULT_SCHEMA_TEMPLATE,
};
pub use registry::{get_provider, get_provider_with_env, SUPPORTED_PROVIDERS};
pub use stub::{StubProvider, STUB_RESPONSE};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),

    /// API returned a non-success status
    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response carried no text
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Unknown provider: {name:?}. Supported: {supported}")]
    UnknownProvider { name: String, supported: String },

    #[error("Provider {provider:?} requires env var {env_var} but it is not set.")]
    MissingCredential { provider: String, env_var: String },
}

impl LlmError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Connection(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A model backend that completes prompts.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry name (`stub`, `ollama`, ...).
    fn name(&self) -> &str;

    /// Model identifier, when the provider has one.
    fn model(&self) -> Option<&str> {
        None
    }

    /// Send `prompt` and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Build the shared HTTP client for remote providers.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .expect("Failed to create HTTP client")
}

/// Turn a non-success response into an [`LlmError::Api`].
pub(crate) async fn api_error(resp: reqwest::Response) -> LlmError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    LlmError::Api {
        status,
        message: body.chars().take(500).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(LlmError::Connection("reset".into()).is_transient());
        assert!(LlmError::Api { status: 503, message: String::new() }.is_transient());
        assert!(LlmError::Api { status: 429, message: String::new() }.is_transient());
        assert!(!LlmError::Api { status: 401, message: String::new() }.is_transient());
        assert!(!LlmError::Parse("bad".into()).is_transient());
    }
}
