//! Legacy analytics command.

use std::path::PathBuf;

use console::style;

use crate::analytics::load_bowtie;
use crate::config::Settings;
use crate::services::process_raw_files;

/// Parse raw incident text, score against the reference bowtie and write
/// processed JSON plus fleet metrics.
pub async fn cmd_process(
    settings: &Settings,
    raw_dir: Option<PathBuf>,
    processed_dir: Option<PathBuf>,
    bowtie: Option<PathBuf>,
) -> anyhow::Result<()> {
    let raw_dir = raw_dir.unwrap_or_else(|| settings.raw_dir());
    let processed_dir = processed_dir.unwrap_or_else(|| settings.processed_dir());
    let bowtie_path = bowtie.unwrap_or_else(|| settings.bowtie_path());

    let bowtie = match load_bowtie(&bowtie_path) {
        Ok(bowtie) => Some(bowtie),
        Err(e) => {
            tracing::warn!("{}; continuing without analytics", e);
            None
        }
    };

    let report = tokio::task::spawn_blocking(move || {
        process_raw_files(&raw_dir, &processed_dir, bowtie.as_ref())
    })
    .await??;

    println!(
        "{} Processed {} incidents",
        style("✓").green(),
        report.incidents.len()
    );
    if let Some(metrics) = report.metrics {
        println!(
            "  {} Average overall coverage: {:.1}%",
            style("→").dim(),
            metrics.average_overall_coverage * 100.0
        );
    }

    Ok(())
}
