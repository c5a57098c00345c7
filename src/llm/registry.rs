//! Resolve a provider name to a ready provider.

use tracing::debug;

use super::ollama::DEFAULT_OLLAMA_HOST;
use super::{
    AnthropicProvider, GeminiProvider, LlmConfig, LlmError, LlmProvider, OllamaProvider,
    OpenAiProvider, StubProvider,
};

pub const SUPPORTED_PROVIDERS: &[&str] = &["stub", "ollama", "openai", "anthropic", "gemini"];

fn credential_var(name: &str) -> Option<&'static str> {
    match name {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        _ => None,
    }
}

/// Build the provider named by `config.provider`, reading credentials from
/// the process environment.
pub fn get_provider(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    get_provider_with_env(config, |var| std::env::var(var).ok())
}

/// Build the provider named by `config.provider`, reading credentials and
/// `OLLAMA_HOST` through `env`.
pub fn get_provider_with_env<F>(config: &LlmConfig, env: F) -> Result<Box<dyn LlmProvider>, LlmError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = config.provider.as_str();
    if !SUPPORTED_PROVIDERS.contains(&name) {
        return Err(LlmError::UnknownProvider {
            name: name.to_string(),
            supported: SUPPORTED_PROVIDERS.join(", "),
        });
    }

    let api_key = match credential_var(name) {
        Some(var) => match env(var).filter(|key| !key.trim().is_empty()) {
            Some(key) => key,
            None => {
                return Err(LlmError::MissingCredential {
                    provider: name.to_string(),
                    env_var: var.to_string(),
                })
            }
        },
        None => String::new(),
    };

    debug!("Using LLM provider {}", name);
    let provider: Box<dyn LlmProvider> = match name {
        "stub" => Box::new(StubProvider),
        "ollama" => {
            let endpoint = config
                .endpoint
                .clone()
                .or_else(|| env("OLLAMA_HOST"))
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
            Box::new(OllamaProvider::new(config, endpoint))
        }
        "openai" => Box::new(OpenAiProvider::new(config, api_key)),
        "anthropic" => Box::new(AnthropicProvider::new(config, api_key)),
        _ => Box::new(GeminiProvider::new(config, api_key)),
    };
    Ok(provider)
}
