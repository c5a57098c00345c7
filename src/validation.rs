//! Schema v2.2 validation for structured incident documents.
//!
//! Validation collects every problem rather than stopping at the first, so a
//! failing document can be annotated with the full list.

use serde_json::{Map, Value};

pub const SCHEMA_VERSION: &str = "2.2";

pub const SIDES: &[&str] = &["prevention", "mitigation"];
pub const BARRIER_TYPES: &[&str] = &["engineering", "administrative", "ppe", "unknown"];
pub const LINES_OF_DEFENSE: &[&str] = &["1st", "2nd", "3rd", "recovery", "unknown"];
pub const BARRIER_STATUSES: &[&str] = &[
    "active",
    "degraded",
    "failed",
    "bypassed",
    "not_installed",
    "unknown",
];
pub const CONFIDENCE_LEVELS: &[&str] = &["high", "medium", "low"];

/// Every schema violation in `payload`; empty when valid.
pub fn validate_incident(payload: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(root) = payload.as_object() else {
        errors.push("document must be a JSON object".to_string());
        return errors;
    };

    require_string(root, "incident_id", "incident_id", &mut errors);

    if let Some(event) = require_object(root, "event", "event", &mut errors) {
        for key in ["summary", "hazard", "top_event"] {
            optional_string(event, key, &format!("event.{}", key), &mut errors);
        }
    }

    if let Some(notes) = require_object(root, "notes", "notes", &mut errors) {
        match notes.get("schema_version").and_then(Value::as_str) {
            Some(SCHEMA_VERSION) => {}
            Some(other) => errors.push(format!(
                "notes.schema_version: expected \"{}\", got \"{}\"",
                SCHEMA_VERSION, other
            )),
            None => errors.push("notes.schema_version: required string".to_string()),
        }
    }

    if let Some(bowtie) = require_object(root, "bowtie", "bowtie", &mut errors) {
        validate_bowtie(bowtie, &mut errors);
    }

    errors
}

fn validate_bowtie(bowtie: &Map<String, Value>, errors: &mut Vec<String>) {
    for (key, id_key) in [("threats", "threat_id"), ("consequences", "consequence_id")] {
        let Some(value) = bowtie.get(key) else {
            continue;
        };
        let Some(items) = value.as_array() else {
            errors.push(format!("bowtie.{}: must be an array", key));
            continue;
        };
        for (i, item) in items.iter().enumerate() {
            let path = format!("bowtie.{}[{}]", key, i);
            match item.as_object() {
                Some(obj) => require_string(obj, id_key, &format!("{}.{}", path, id_key), errors),
                None => errors.push(format!("{}: must be an object", path)),
            }
        }
    }

    let Some(controls) = bowtie.get("controls") else {
        errors.push("bowtie.controls: required array".to_string());
        return;
    };
    let Some(controls) = controls.as_array() else {
        errors.push("bowtie.controls: must be an array".to_string());
        return;
    };

    for (i, control) in controls.iter().enumerate() {
        let path = format!("bowtie.controls[{}]", i);
        let Some(control) = control.as_object() else {
            errors.push(format!("{}: must be an object", path));
            continue;
        };
        require_string(control, "control_id", &format!("{}.control_id", path), errors);
        require_string(control, "name", &format!("{}.name", path), errors);
        check_enum(control, "side", SIDES, &path, errors);
        check_enum(control, "barrier_type", BARRIER_TYPES, &path, errors);
        check_enum(control, "line_of_defense", LINES_OF_DEFENSE, &path, errors);
        check_enum(control, "barrier_status", BARRIER_STATUSES, &path, errors);
        check_enum(control, "confidence", CONFIDENCE_LEVELS, &path, errors);
        for key in ["linked_threat_ids", "linked_consequence_ids"] {
            if let Some(value) = control.get(key) {
                let ok = value
                    .as_array()
                    .is_some_and(|ids| ids.iter().all(Value::is_string));
                if !ok {
                    errors.push(format!("{}.{}: must be an array of strings", path, key));
                }
            }
        }
    }
}

fn require_object<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Vec<String>,
) -> Option<&'a Map<String, Value>> {
    match obj.get(key) {
        Some(Value::Object(inner)) => Some(inner),
        Some(_) => {
            errors.push(format!("{}: must be an object", path));
            None
        }
        None => {
            errors.push(format!("{}: required object", path));
            None
        }
    }
}

fn require_string(obj: &Map<String, Value>, key: &str, path: &str, errors: &mut Vec<String>) {
    match obj.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => {}
        _ => errors.push(format!("{}: required non-empty string", path)),
    }
}

fn optional_string(obj: &Map<String, Value>, key: &str, path: &str, errors: &mut Vec<String>) {
    match obj.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(_) => errors.push(format!("{}: must be a string or null", path)),
    }
}

fn check_enum(
    obj: &Map<String, Value>,
    key: &str,
    allowed: &[&str],
    path: &str,
    errors: &mut Vec<String>,
) {
    match obj.get(key).and_then(Value::as_str) {
        Some(value) if allowed.contains(&value) => {}
        Some(value) => errors.push(format!(
            "{}.{}: \"{}\" is not one of {}",
            path,
            key,
            value,
            allowed.join(", ")
        )),
        None => errors.push(format!("{}.{}: required, one of {}", path, key, allowed.join(", "))),
    }
}
