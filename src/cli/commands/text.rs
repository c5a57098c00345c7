//! Text extraction command.

use std::path::{Path, PathBuf};

use console::style;

use crate::config::Settings;
use crate::extraction::PdftotextExtractor;
use crate::manifest::{load_records, merge_extraction, save_records};
use crate::models::{AcquisitionRecord, ExtractionRecord};
use crate::services::{extract_manifest, TextSummary};

/// Extract text for every downloaded record in the acquisition manifest.
pub async fn cmd_extract_text(
    settings: &Settings,
    manifest: Option<PathBuf>,
    out: Option<PathBuf>,
    append: bool,
) -> anyhow::Result<()> {
    let manifest = manifest.unwrap_or_else(|| settings.acquisition_manifest());
    let out = out.unwrap_or_else(|| settings.text_manifest());
    let raw_dir = manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.raw_dir());

    let records: Vec<AcquisitionRecord> = load_records(&manifest)?;
    if records.is_empty() {
        println!(
            "{} No records in {}",
            style("!").yellow(),
            manifest.display()
        );
        println!(
            "  {} Run 'bowtie acquire --download' to fetch reports",
            style("→").dim()
        );
        return Ok(());
    }

    let extractor = PdftotextExtractor::new();
    let rows = tokio::task::spawn_blocking(move || extract_manifest(&records, &raw_dir, &extractor))
        .await?;
    let summary = TextSummary::of(&rows);

    let rows = if append && out.exists() {
        let existing: Vec<ExtractionRecord> = load_records(&out)?;
        merge_extraction(&existing, &rows).records
    } else {
        rows
    };
    save_records(&out, &rows)?;

    println!(
        "{} Extracted {} of {} documents",
        style("✓").green(),
        summary.extracted,
        summary.total
    );
    if summary.empty > 0 {
        println!(
            "  {} {} produced no text (scanned PDFs?)",
            style("!").yellow(),
            summary.empty
        );
    }
    if summary.failed > 0 {
        println!("  {} {} failed", style("✗").red(), summary.failed);
    }
    println!("  {} Manifest: {}", style("→").dim(), out.display());

    Ok(())
}
