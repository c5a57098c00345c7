//! LLM provider configuration.

use serde::{Deserialize, Serialize};

/// Configuration for structured extraction providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (stub, ollama, openai, anthropic, gemini)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model to request (provider-specific default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// API endpoint (provider-specific default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Maximum tokens in response
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Temperature for generation
    #[serde(default)]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Extra attempts after a transient failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Maximum characters of incident text to send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_content_chars: Option<usize>,
}

fn default_provider() -> String {
    "stub".to_string()
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> u32 {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            endpoint: None,
            max_output_tokens: default_max_output_tokens(),
            temperature: 0.0,
            timeout: default_timeout(),
            retries: default_retries(),
            max_content_chars: None,
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides.
    ///
    /// - `LLM_PROVIDER`: provider name
    /// - `LLM_MODEL`: model name
    /// - `LLM_ENDPOINT`: API endpoint
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("LLM_PROVIDER") {
            self.provider = val.to_lowercase();
        }
        if let Ok(val) = std::env::var("LLM_MODEL") {
            self.model = Some(val);
        }
        if let Ok(val) = std::env::var("LLM_ENDPOINT") {
            self.endpoint = Some(val);
        }
        self
    }

    /// Trim incident text to `max_content_chars`, on a char boundary.
    pub fn truncate_content<'a>(&self, text: &'a str) -> &'a str {
        match self.max_content_chars {
            Some(max) => match text.char_indices().nth(max) {
                Some((idx, _)) => &text[..idx],
                None => text,
            },
            None => text,
        }
    }
}
