//! LLM structuring stage: incident text files to Schema v2.2 JSON.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::llm::{parse_llm_json, LlmProvider, PromptLoader};
use crate::models::{timestamp_now, StructuredRecord};
use crate::validation::validate_incident;

const MAX_ERROR_CHARS: usize = 200;
const MAX_RAW_CHARS: usize = 2000;

/// Options for one structuring pass.
#[derive(Debug, Clone, Default)]
pub struct StructuredOptions {
    /// Provider name recorded in the manifest and used for raw response paths
    pub provider_name: String,
    pub model_name: Option<String>,
    /// Maximum files to process; skipped files don't count
    pub limit: Option<usize>,
    /// Skip files whose output JSON already exists
    pub resume: bool,
    /// Maximum characters of incident text sent to the provider
    pub max_content_chars: Option<usize>,
}

/// Counts for one structuring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuredSummary {
    pub total: usize,
    pub extracted: usize,
    pub valid: usize,
    pub failed: usize,
}

impl StructuredSummary {
    pub fn of(records: &[StructuredRecord]) -> Self {
        Self {
            total: records.len(),
            extracted: records.iter().filter(|r| r.extracted).count(),
            valid: records.iter().filter(|r| r.valid).count(),
            failed: records.iter().filter(|r| !r.extracted).count(),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Structure every `*.txt` file in `text_dir`, writing one JSON per incident
/// into `out_dir`.
///
/// Raw provider responses are kept under `<out_dir parent>/raw/<provider>/`.
/// Per-file failures are recorded in the returned rows; only failing to
/// create `out_dir` is an error.
pub async fn extract_structured(
    text_dir: &Path,
    out_dir: &Path,
    provider: &dyn LlmProvider,
    prompts: &PromptLoader,
    options: &StructuredOptions,
) -> std::io::Result<Vec<StructuredRecord>> {
    std::fs::create_dir_all(out_dir)?;
    let mut rows = Vec::new();

    let txt_files = list_text_files(text_dir);
    if txt_files.is_empty() {
        warn!("No .txt files found in {}", text_dir.display());
        return Ok(rows);
    }

    info!(
        "Processing {} text files with provider={}",
        txt_files.len(),
        options.provider_name
    );

    let raw_base = out_dir.parent().unwrap_or(out_dir);
    let mut processed = 0;

    for txt_path in txt_files {
        let Some(incident_id) = txt_path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        let json_path = out_dir.join(format!("{}.json", incident_id));

        if options.resume && json_path.exists() {
            info!("{}: already extracted, skipping (--resume)", incident_id);
            continue;
        }

        if options.limit.is_some_and(|limit| processed >= limit) {
            info!("Reached --limit={}, stopping.", processed);
            break;
        }

        let mut row = StructuredRecord::pending(
            &incident_id,
            txt_path.display().to_string(),
            json_path.display().to_string(),
            &options.provider_name,
            options.model_name.clone(),
        );

        if let Err(e) =
            structure_one(&txt_path, &json_path, raw_base, provider, prompts, options, &mut row).await
        {
            error!("{}: extraction failed: {:#}", incident_id, e);
            row.error = Some(truncate_chars(&format!("{:#}", e), MAX_ERROR_CHARS));
        }

        rows.push(row);
        processed += 1;
    }

    Ok(rows)
}

fn list_text_files(text_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(text_dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    files
}

async fn structure_one(
    txt_path: &Path,
    json_path: &Path,
    raw_base: &Path,
    provider: &dyn LlmProvider,
    prompts: &PromptLoader,
    options: &StructuredOptions,
    row: &mut StructuredRecord,
) -> anyhow::Result<()> {
    let incident_id = row.incident_id.clone();
    let text = std::fs::read_to_string(txt_path)
        .with_context(|| format!("Failed to read {}", txt_path.display()))?;
    if text.trim().is_empty() {
        row.error = Some("Empty text file".to_string());
        return Ok(());
    }

    let text = match options.max_content_chars {
        Some(max) => truncate_chars(&text, max),
        None => text,
    };
    let prompt = prompts.assemble(&text)?;
    let raw_response = provider.complete(&prompt).await?;

    let raw_path = save_raw_response(&raw_response, &options.provider_name, &incident_id, raw_base)?;
    row.raw_response_path = Some(raw_path.display().to_string());

    let parsed = parse_llm_json(&raw_response).map_err(|e| e.to_string()).and_then(|value| {
        match value {
            Value::Object(_) => Ok(value),
            _ => Err("expected a JSON object".to_string()),
        }
    });

    let mut payload = match parsed {
        Ok(payload) => payload,
        Err(parse_err) => {
            let message = format!("JSON parse error: {}", parse_err);
            let error_payload = json!({
                "incident_id": incident_id,
                "errors": [message],
                "raw": truncate_chars(&raw_response, MAX_RAW_CHARS),
            });
            write_json(json_path, &error_payload)?;
            row.extracted = true;
            row.extracted_at = Some(timestamp_now());
            row.valid = false;
            row.validation_errors = Some(message);
            warn!("{}: JSON parse failed: {}", incident_id, parse_err);
            return Ok(());
        }
    };

    payload["incident_id"] = Value::String(incident_id.clone());

    let errors = validate_incident(&payload);
    row.valid = errors.is_empty();
    row.extracted = true;
    row.extracted_at = Some(timestamp_now());

    if !errors.is_empty() {
        row.validation_errors = StructuredRecord::summarize_errors(&errors);
        warn!(
            "{}: validation failed: {:?}",
            incident_id,
            &errors[..errors.len().min(3)]
        );
        payload["_validation_errors"] = json!(errors);
    }

    write_json(json_path, &payload)?;
    info!("{}: extracted (valid={})", incident_id, row.valid);
    Ok(())
}

fn save_raw_response(
    raw: &str,
    provider_name: &str,
    incident_id: &str,
    base_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let raw_dir = base_dir.join("raw").join(provider_name);
    std::fs::create_dir_all(&raw_dir)
        .with_context(|| format!("Failed to create {}", raw_dir.display()))?;
    let raw_path = raw_dir.join(format!("{}.txt", incident_id));
    std::fs::write(&raw_path, raw)
        .with_context(|| format!("Failed to write {}", raw_path.display()))?;
    Ok(raw_path)
}

fn write_json(path: &Path, value: &Value) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, StubProvider};
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Returns a fixed response for every prompt.
    struct FixedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::Connection("connection refused".to_string()))
        }
    }

    fn options(provider_name: &str) -> StructuredOptions {
        StructuredOptions {
            provider_name: provider_name.to_string(),
            ..StructuredOptions::default()
        }
    }

    struct Layout {
        _dir: tempfile::TempDir,
        text_dir: PathBuf,
        out_dir: PathBuf,
    }

    fn layout(files: &[(&str, &str)]) -> Layout {
        let dir = tempdir().unwrap();
        let text_dir = dir.path().join("text");
        let out_dir = dir.path().join("structured").join("incidents");
        std::fs::create_dir_all(&text_dir).unwrap();
        for (name, body) in files {
            std::fs::write(text_dir.join(name), body).unwrap();
        }
        Layout {
            _dir: dir,
            text_dir,
            out_dir,
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_stub_extraction_produces_json() {
        let l = layout(&[("INC-001.txt", "A gas release ignited at the unit.")]);
        let rows = extract_structured(
            &l.text_dir,
            &l.out_dir,
            &StubProvider,
            &PromptLoader::default(),
            &options("stub"),
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(row.extracted);
        assert!(row.valid, "{:?}", row.validation_errors);
        assert!(row.extracted_at.is_some());
        assert_eq!(row.provider_name, "stub");

        let data = read_json(&l.out_dir.join("INC-001.json"));
        assert_eq!(data["incident_id"], "INC-001");
        assert_eq!(data["notes"]["schema_version"], "2.2");

        let raw_path = l.out_dir.parent().unwrap().join("raw/stub/INC-001.txt");
        assert!(raw_path.exists());
        assert_eq!(row.raw_response_path.as_deref(), Some(raw_path.to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_empty_text_file() {
        let l = layout(&[("EMPTY.txt", "  \n\t ")]);
        let rows = extract_structured(
            &l.text_dir,
            &l.out_dir,
            &StubProvider,
            &PromptLoader::default(),
            &options("stub"),
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert!(!rows[0].extracted);
        assert_eq!(rows[0].error.as_deref(), Some("Empty text file"));
        assert!(!l.out_dir.join("EMPTY.json").exists());
    }

    #[tokio::test]
    async fn test_unparseable_response_writes_error_json() {
        let l = layout(&[("BAD.txt", "Some incident.")]);
        let rows = extract_structured(
            &l.text_dir,
            &l.out_dir,
            &FixedProvider("I cannot help with that."),
            &PromptLoader::default(),
            &options("fixed"),
        )
        .await
        .unwrap();

        let row = &rows[0];
        assert!(row.extracted);
        assert!(!row.valid);
        assert!(row
            .validation_errors
            .as_deref()
            .unwrap()
            .starts_with("JSON parse error:"));

        let data = read_json(&l.out_dir.join("BAD.json"));
        assert_eq!(data["incident_id"], "BAD");
        assert_eq!(data["raw"], "I cannot help with that.");
        assert!(data["errors"][0].as_str().unwrap().starts_with("JSON parse error:"));
    }

    #[tokio::test]
    async fn test_invalid_document_is_annotated() {
        let l = layout(&[("INV.txt", "Some incident.")]);
        let rows = extract_structured(
            &l.text_dir,
            &l.out_dir,
            &FixedProvider(r#"{"incident_id": "other"}"#),
            &PromptLoader::default(),
            &options("fixed"),
        )
        .await
        .unwrap();

        let row = &rows[0];
        assert!(row.extracted);
        assert!(!row.valid);
        assert!(row.validation_errors.as_deref().unwrap().contains("event: required object"));

        let data = read_json(&l.out_dir.join("INV.json"));
        assert_eq!(data["incident_id"], "INV");
        assert!(!data["_validation_errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_recorded() {
        let l = layout(&[("ERR.txt", "Some incident.")]);
        let rows = extract_structured(
            &l.text_dir,
            &l.out_dir,
            &FailingProvider,
            &PromptLoader::default(),
            &options("failing"),
        )
        .await
        .unwrap();

        let row = &rows[0];
        assert!(!row.extracted);
        assert!(row.error.as_deref().unwrap().contains("connection refused"));
        assert!(row.error.as_deref().unwrap().chars().count() <= MAX_ERROR_CHARS);
    }

    #[tokio::test]
    async fn test_resume_and_limit() {
        let l = layout(&[
            ("A.txt", "alpha incident"),
            ("B.txt", "bravo incident"),
            ("C.txt", "charlie incident"),
            ("notes.md", "ignored"),
        ]);
        std::fs::create_dir_all(&l.out_dir).unwrap();
        std::fs::write(l.out_dir.join("A.json"), "{}").unwrap();

        let opts = StructuredOptions {
            resume: true,
            limit: Some(1),
            ..options("stub")
        };
        let rows = extract_structured(
            &l.text_dir,
            &l.out_dir,
            &StubProvider,
            &PromptLoader::default(),
            &opts,
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].incident_id, "B");
        assert_eq!(std::fs::read_to_string(l.out_dir.join("A.json")).unwrap(), "{}");
        assert!(!l.out_dir.join("C.json").exists());
    }

    #[tokio::test]
    async fn test_missing_text_dir() {
        let dir = tempdir().unwrap();
        let rows = extract_structured(
            &dir.path().join("missing"),
            &dir.path().join("out"),
            &StubProvider,
            &PromptLoader::default(),
            &options("stub"),
        )
        .await
        .unwrap();
        assert!(rows.is_empty());
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_summary() {
        let mut ok = StructuredRecord::pending("a", "", "", "stub", None);
        ok.extracted = true;
        ok.valid = true;
        let failed = StructuredRecord::pending("b", "", "", "stub", None);
        let summary = StructuredSummary::of(&[ok, failed]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.valid, 1);
        assert_eq!(summary.failed, 1);
    }
}
