//! Legacy pass: incident text blocks to analysed JSON and fleet metrics.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::analytics::{
    calculate_barrier_coverage, calculate_fleet_metrics, identify_gaps, Bowtie, FleetMetrics,
    IncidentAnalytics,
};
use crate::models::Incident;

pub const FLEET_METRICS_FILE: &str = "fleet_metrics.json";

/// One incident as written to the processed directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedIncident {
    #[serde(flatten)]
    pub incident: Incident,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<IncidentAnalytics>,
}

/// Outcome of one processing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub incidents: Vec<ProcessedIncident>,
    pub metrics: Option<FleetMetrics>,
}

/// Split a raw file into incident blocks separated by blank lines.
pub fn split_blocks(content: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                blocks.push(&content[s..end]);
            }
        } else {
            start.get_or_insert(offset);
            end = offset + line.trim_end().len();
        }
        offset += line.len();
    }
    if let Some(s) = start {
        blocks.push(&content[s..end]);
    }
    blocks
}

/// Parse every `*.txt` in `raw_dir`, attach analytics against `bowtie` when
/// given, and write one JSON per incident plus fleet metrics into
/// `processed_dir`.
///
/// A missing `raw_dir` yields an empty report. Blocks that fail to parse are
/// skipped with a warning.
pub fn process_raw_files(
    raw_dir: &Path,
    processed_dir: &Path,
    bowtie: Option<&Bowtie>,
) -> anyhow::Result<ProcessReport> {
    if !raw_dir.is_dir() {
        error!("Raw directory not found: {}", raw_dir.display());
        return Ok(ProcessReport {
            incidents: Vec::new(),
            metrics: None,
        });
    }

    std::fs::create_dir_all(processed_dir)
        .with_context(|| format!("Failed to create {}", processed_dir.display()))?;

    if let Some(bowtie) = bowtie {
        info!("Loaded Bowtie reference: {} -> {}", bowtie.hazard, bowtie.top_event);
    }

    let mut incidents = Vec::new();
    for file_path in text_files(raw_dir)? {
        let name = file_path.display().to_string();
        info!("Processing file: {}", name);

        let content = match std::fs::read_to_string(&file_path) {
            Ok(content) => content,
            Err(e) => {
                error!("Error reading file {}: {}", name, e);
                continue;
            }
        };

        for block in split_blocks(&content) {
            let incident = match Incident::from_text_block(block) {
                Ok(incident) => incident,
                Err(e) => {
                    warn!("Failed to parse block in {}: {}", name, e);
                    continue;
                }
            };

            let analytics = bowtie.map(|bowtie| IncidentAnalytics {
                coverage: calculate_barrier_coverage(&incident, bowtie),
                gaps: identify_gaps(&incident, bowtie),
            });
            if let Some(analytics) = &analytics {
                info!(
                    "Analyzed {}: Coverage={:.1}%, Gaps={}",
                    incident.incident_id,
                    analytics.coverage.overall_coverage * 100.0,
                    analytics.gaps.len()
                );
            }

            let processed = ProcessedIncident {
                incident,
                analytics,
            };
            let output = processed_dir.join(format!("{}.json", processed.incident.incident_id));
            write_json(&output, &processed)?;
            info!("Saved {}", processed.incident.incident_id);
            incidents.push(processed);
        }
    }

    let metrics = if incidents.is_empty() {
        None
    } else {
        let analytics: Vec<Option<&IncidentAnalytics>> =
            incidents.iter().map(|i| i.analytics.as_ref()).collect();
        let metrics = calculate_fleet_metrics(&analytics);
        write_json(&processed_dir.join(FLEET_METRICS_FILE), &metrics)?;
        info!("Saved fleet metrics to {}", FLEET_METRICS_FILE);
        Some(metrics)
    };

    info!("Pipeline finished. Processed {} incidents.", incidents.len());
    Ok(ProcessReport { incidents, metrics })
}

fn text_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}
