//! Offline manifest merge command.

use std::path::Path;

use console::style;

use crate::manifest::{load_records, merge_acquisition, save_records};
use crate::models::AcquisitionRecord;

/// Merge `incoming` into `existing` and write the result to `out`
/// (or back to `existing`).
pub async fn cmd_merge(existing: &Path, incoming: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    if !incoming.exists() {
        anyhow::bail!("Incoming manifest not found: {}", incoming.display());
    }

    let current: Vec<AcquisitionRecord> = load_records(existing)?;
    let fresh: Vec<AcquisitionRecord> = load_records(incoming)?;
    let outcome = merge_acquisition(&current, &fresh);

    let out = out.unwrap_or(existing);
    save_records(out, &outcome.records)?;

    let summary = outcome.summary;
    println!(
        "{} Merged {} incoming records into {} existing",
        style("✓").green(),
        summary.total_incoming(),
        current.len()
    );
    println!(
        "  {} {} new, {} replaced, {} kept, {} enriched",
        style("→").dim(),
        summary.inserted,
        summary.replaced,
        summary.kept,
        summary.enriched
    );
    println!(
        "  {} Wrote {} records to {}",
        style("→").dim(),
        outcome.records.len(),
        out.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncidentSource;
    use tempfile::tempdir;

    fn record(id: &str, downloaded: bool) -> AcquisitionRecord {
        let mut record = AcquisitionRecord::discovered(
            IncidentSource::Bsee,
            id,
            "Report",
            "",
            format!("https://example.test/{}.pdf", id),
            format!("bsee/pdfs/{}.pdf", id),
        );
        record.downloaded = downloaded;
        record
    }

    #[tokio::test]
    async fn test_merge_writes_existing_by_default() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("existing.csv");
        let incoming = dir.path().join("incoming.csv");
        save_records(&existing, &[record("a", false)]).unwrap();
        save_records(&incoming, &[record("a", true), record("b", false)]).unwrap();

        cmd_merge(&existing, &incoming, None).await.unwrap();

        let merged: Vec<AcquisitionRecord> = load_records(&existing).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged[0].downloaded);
        assert_eq!(merged[1].incident_id, "b");
    }

    #[tokio::test]
    async fn test_missing_incoming_is_an_error() {
        let dir = tempdir().unwrap();
        let result = cmd_merge(
            &dir.path().join("existing.csv"),
            &dir.path().join("missing.csv"),
            None,
        )
        .await;
        assert!(result.is_err());
    }
}
