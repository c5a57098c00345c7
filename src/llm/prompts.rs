//! Prompt assembly for Schema v2.2 structured extraction.
//!
//! The prompt template carries two placeholders, `{{SCHEMA_TEMPLATE}}` and
//! `{{INCIDENT_TEXT}}`. Both the template and the schema can be replaced by
//! files; the built-in copies are used otherwise.

use std::path::{Path, PathBuf};

use thiserror::Error;

const SCHEMA_PLACEHOLDER: &str = "{{SCHEMA_TEMPLATE}}";
const TEXT_PLACEHOLDER: &str = "{{INCIDENT_TEXT}}";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("incident_text must not be empty")]
    EmptyText,

    #[error("Prompt template not found: {0}")]
    PromptNotFound(PathBuf),

    #[error("Schema template not found: {0}")]
    SchemaNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"# Bowtie Incident Extraction

You are a process safety analyst. Read the incident report below and describe
it as a Bowtie: the hazard, the top event, the threats that led to it, the
consequences that followed, and every control (barrier) that stood between
them.

Return ONLY a single JSON object that follows this schema exactly. No prose,
no Markdown fences.

```json
{{SCHEMA_TEMPLATE}}
```

## Rules

- `incident_id` is a short identifier for the report.
- Every control gets a unique `control_id` (`C-001`, `C-002`, ...).
- Link controls to threats and consequences by id.
- Quote or closely paraphrase the report in `evidence`. Leave fields `null`
  when the report does not say.
- Set `notes.schema_version` to `"2.2"`.

## Enum Constraints

Use exactly one of the listed values for each field.
Do not invent new categories or synonyms; use `unknown` when the report is unclear.

- `side`: `prevention`, `mitigation`
- `barrier_type`: `engineering`, `administrative`, `ppe`, `unknown`
- `line_of_defense`: `1st`, `2nd`, `3rd`, `recovery`, `unknown`
- `barrier_status`: `active`, `degraded`, `failed`, `bypassed`, `not_installed`, `unknown`
- `confidence`: `high`, `medium`, `low`

## Incident Report

{{INCIDENT_TEXT}}
"#;

pub const DEFAULT_SCHEMA_TEMPLATE: &str = r#"{
  "incident_id": "string",
  "source": {
    "agency": "CSB | BSEE | other",
    "report_title": "string | null",
    "url": "string | null"
  },
  "event": {
    "date": "YYYY-MM-DD | null",
    "location": "string | null",
    "facility_type": "string | null",
    "summary": "string",
    "hazard": "string",
    "top_event": "string"
  },
  "bowtie": {
    "threats": [
      { "threat_id": "T-001", "name": "string" }
    ],
    "consequences": [
      { "consequence_id": "Q-001", "name": "string", "severity": "string | null" }
    ],
    "controls": [
      {
        "control_id": "C-001",
        "name": "string",
        "side": "prevention | mitigation",
        "barrier_type": "engineering | administrative | ppe | unknown",
        "line_of_defense": "1st | 2nd | 3rd | recovery | unknown",
        "barrier_status": "active | degraded | failed | bypassed | not_installed | unknown",
        "linked_threat_ids": ["T-001"],
        "linked_consequence_ids": ["Q-001"],
        "evidence": "string | null",
        "confidence": "high | medium | low"
      }
    ]
  },
  "notes": {
    "schema_version": "2.2",
    "extraction_notes": "string | null"
  }
}"#;

/// A prompt template and the schema it embeds.
#[derive(Debug, Clone)]
pub struct PromptLoader {
    template: String,
    schema: String,
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            schema: DEFAULT_SCHEMA_TEMPLATE.to_string(),
        }
    }
}

impl PromptLoader {
    /// Load templates, falling back to the built-in copy for any path not given.
    pub fn from_paths(
        prompt_path: Option<&Path>,
        schema_path: Option<&Path>,
    ) -> Result<Self, PromptError> {
        let template = match prompt_path {
            Some(path) => read_template(path, PromptError::PromptNotFound)?,
            None => DEFAULT_PROMPT_TEMPLATE.to_string(),
        };
        let schema = match schema_path {
            Some(path) => read_template(path, PromptError::SchemaNotFound)?,
            None => DEFAULT_SCHEMA_TEMPLATE.to_string(),
        };
        Ok(Self { template, schema })
    }

    /// Assemble the full prompt for one incident.
    pub fn assemble(&self, incident_text: &str) -> Result<String, PromptError> {
        if incident_text.trim().is_empty() {
            return Err(PromptError::EmptyText);
        }
        // Schema first so incident text containing a placeholder is left alone.
        Ok(self
            .template
            .replace(SCHEMA_PLACEHOLDER, self.schema.trim())
            .replace(TEXT_PLACEHOLDER, incident_text))
    }
}

fn read_template(
    path: &Path,
    not_found: fn(PathBuf) -> PromptError,
) -> Result<String, PromptError> {
    if !path.is_file() {
        return Err(not_found(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Assemble a prompt from optional template files.
pub fn load_prompt(
    incident_text: &str,
    prompt_path: Option<&Path>,
    schema_path: Option<&Path>,
) -> Result<String, PromptError> {
    if incident_text.trim().is_empty() {
        return Err(PromptError::EmptyText);
    }
    PromptLoader::from_paths(prompt_path, schema_path)?.assemble(incident_text)
}
