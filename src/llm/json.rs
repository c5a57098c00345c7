//! Recover a JSON object from free-form model output.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonExtractError {
    #[error("Empty response text")]
    Empty,

    #[error("No JSON object found in response")]
    NoObject,

    #[error("Unbalanced braces in response")]
    Unbalanced,

    #[error("{0}")]
    Invalid(String),
}

/// Parse model output that should contain a single JSON document.
///
/// Tries, in order: the whole text, the text with Markdown code fence lines
/// removed, and the first balanced `{...}` span.
pub fn parse_llm_json(text: &str) -> Result<Value, JsonExtractError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(JsonExtractError::Empty);
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    if text.starts_with("```") {
        let unfenced: Vec<&str> = text
            .lines()
            .filter(|line| !line.trim().starts_with("```"))
            .collect();
        if let Ok(value) = serde_json::from_str(unfenced.join("\n").trim()) {
            return Ok(value);
        }
    }

    let span = balanced_object(text)?;
    serde_json::from_str(span).map_err(|e| JsonExtractError::Invalid(e.to_string()))
}

/// The first `{` through its matching `}`, skipping braces inside strings.
fn balanced_object(text: &str) -> Result<&str, JsonExtractError> {
    let start = text.find('{').ok_or(JsonExtractError::NoObject)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    Err(JsonExtractError::Unbalanced)
}
