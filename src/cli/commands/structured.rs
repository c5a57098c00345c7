//! Structured (LLM) extraction command.

use std::path::PathBuf;

use console::style;

use crate::config::Settings;
use crate::llm::{get_provider, LlmConfig, PromptLoader};
use crate::manifest::{load_records, merge_structured, save_records};
use crate::models::StructuredRecord;
use crate::services::{extract_structured, StructuredOptions, StructuredSummary};

pub struct StructuredArgs {
    pub text_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub limit: Option<usize>,
    pub resume: bool,
}

impl StructuredArgs {
    /// Command-line values layered over the configured provider settings.
    fn llm_config(&self, base: &LlmConfig) -> LlmConfig {
        let mut config = base.clone();
        if let Some(ref provider) = self.provider {
            config.provider = provider.clone();
        }
        if self.model.is_some() {
            config.model = self.model.clone();
        }
        if let Some(tokens) = self.max_output_tokens {
            config.max_output_tokens = tokens;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        config
    }
}

/// Structure incident text files and update the structured manifest.
pub async fn cmd_extract_structured(settings: &Settings, args: StructuredArgs) -> anyhow::Result<()> {
    let llm_config = args.llm_config(&settings.llm);
    // Unknown providers and missing keys fail before any file is touched
    let provider = get_provider(&llm_config)?;
    let prompts =
        PromptLoader::from_paths(settings.prompt_path.as_deref(), settings.schema_path.as_deref())?;

    let text_dir = args
        .text_dir
        .clone()
        .unwrap_or_else(|| settings.interim_text_dir());
    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| settings.structured_dir());
    let manifest = args
        .manifest
        .clone()
        .unwrap_or_else(|| settings.structured_manifest());

    let options = StructuredOptions {
        provider_name: provider.name().to_string(),
        model_name: provider.model().map(str::to_string),
        limit: args.limit,
        resume: args.resume,
        max_content_chars: llm_config.max_content_chars,
    };

    println!(
        "{} Structuring {} with {}{}",
        style("→").cyan(),
        text_dir.display(),
        options.provider_name,
        options
            .model_name
            .as_deref()
            .map(|m| format!(" ({})", m))
            .unwrap_or_default()
    );

    let rows = extract_structured(&text_dir, &out_dir, provider.as_ref(), &prompts, &options).await?;
    let summary = StructuredSummary::of(&rows);

    let existing: Vec<StructuredRecord> = load_records(&manifest)?;
    let merged = merge_structured(&existing, &rows);
    save_records(&manifest, &merged.records)?;

    println!(
        "{} Processed {} incidents: {} extracted, {} valid, {} failed",
        style("✓").green(),
        summary.total,
        summary.extracted,
        summary.valid,
        summary.failed
    );
    println!(
        "  {} Manifest: {} ({} rows)",
        style("→").dim(),
        manifest.display(),
        merged.records.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> StructuredArgs {
        StructuredArgs {
            text_dir: None,
            out_dir: None,
            manifest: None,
            provider: None,
            model: None,
            max_output_tokens: None,
            temperature: None,
            timeout: None,
            retries: None,
            limit: None,
            resume: false,
        }
    }

    #[test]
    fn test_llm_config_keeps_configured_values() {
        let base = LlmConfig {
            provider: "ollama".to_string(),
            model: Some("llama3.1:8b".to_string()),
            ..Default::default()
        };
        assert_eq!(args().llm_config(&base), base);
    }

    #[test]
    fn test_llm_config_applies_overrides() {
        let mut overrides = args();
        overrides.provider = Some("anthropic".to_string());
        overrides.retries = Some(0);
        overrides.temperature = Some(0.5);

        let config = overrides.llm_config(&LlmConfig::default());
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.retries, 0);
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.timeout, LlmConfig::default().timeout);
    }
}
