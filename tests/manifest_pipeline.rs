//! End-to-end manifest reconciliation through the public API.

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use bowtieacquire::llm::{PromptLoader, StubProvider};
use bowtieacquire::manifest::{load_records, merge_acquisition, merge_structured, save_records};
use bowtieacquire::models::{AcquisitionRecord, IncidentSource, StructuredRecord};
use bowtieacquire::services::{extract_structured, StructuredOptions};

fn discovered(source: IncidentSource, id: &str, pdf_url: &str) -> AcquisitionRecord {
    AcquisitionRecord::discovered(
        source,
        id,
        "",
        "",
        pdf_url,
        format!("{}/pdfs/{}.pdf", source, id),
    )
}

#[test]
fn rerun_acquisition_never_regresses_downloads() {
    let dir = tempdir().unwrap();
    let manifest = dir.path().join("raw/incidents_manifest_v0.csv");

    let fetched_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let first_run = vec![
        discovered(IncidentSource::Csb, "refinery-fire", "https://csb.test/fire.pdf")
            .with_download(
                fetched_at,
                200,
                Some("application/pdf".to_string()),
                100,
                "abc".to_string(),
            ),
        discovered(IncidentSource::Bsee, "crane", ""),
    ];
    save_records(&manifest, &first_run).unwrap();

    // Second discovery pass: same PDF under a new id, nothing downloaded yet
    let mut rediscovered =
        discovered(IncidentSource::Csb, "refinery-fire-2", "https://csb.test/fire.pdf");
    rediscovered.title = "Refinery Fire".to_string();
    let second_run = vec![
        rediscovered,
        discovered(IncidentSource::Bsee, "crane", ""),
        discovered(IncidentSource::Bsee, "other", "https://csb.test/fire.pdf"),
    ];

    let existing: Vec<AcquisitionRecord> = load_records(&manifest).unwrap();
    let outcome = merge_acquisition(&existing, &second_run);
    save_records(&manifest, &outcome.records).unwrap();

    let merged: Vec<AcquisitionRecord> = load_records(&manifest).unwrap();
    assert_eq!(merged.len(), 3);

    let fire = merged
        .iter()
        .find(|r| r.source == IncidentSource::Csb)
        .unwrap();
    assert!(fire.downloaded);
    assert_eq!(fire.content_hash.as_deref(), Some("abc"));
    assert_eq!(fire.file_size_bytes, Some(100));
    assert_eq!(fire.retrieved_at, Some(fetched_at));
    assert_eq!(fire.title, "Refinery Fire");

    assert_eq!(
        merged
            .iter()
            .filter(|r| r.source == IncidentSource::Bsee)
            .count(),
        2
    );

    // A third identical pass changes nothing
    let again = merge_acquisition(&merged, &merged);
    assert_eq!(again.records, merged);
}

#[tokio::test]
async fn structured_rows_upsert_into_manifest() {
    let dir = tempdir().unwrap();
    let text_dir = dir.path().join("interim/text");
    let out_dir = dir.path().join("structured/incidents");
    let manifest = dir.path().join("structured/structured_manifest.csv");
    std::fs::create_dir_all(&text_dir).unwrap();
    std::fs::write(
        text_dir.join("I1.txt"),
        "A gas release ignited near the compressor.",
    )
    .unwrap();

    let mut untouched = StructuredRecord::pending("I2", "", "", "stub", None);
    untouched.extracted = true;
    untouched.valid = true;
    let mut stale = StructuredRecord::pending("I1", "", "", "stub", None);
    stale.extracted = true;
    stale.valid = false;
    stale.validation_errors = Some("bad".to_string());
    save_records(&manifest, &[stale, untouched.clone()]).unwrap();

    let options = StructuredOptions {
        provider_name: "stub".to_string(),
        ..Default::default()
    };
    let rows = extract_structured(
        &text_dir,
        &out_dir,
        &StubProvider,
        &PromptLoader::default(),
        &options,
    )
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);

    let existing: Vec<StructuredRecord> = load_records(&manifest).unwrap();
    let merged = merge_structured(&existing, &rows);
    save_records(&manifest, &merged.records).unwrap();

    let reloaded: Vec<StructuredRecord> = load_records(&manifest).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0].incident_id, "I1");
    assert!(reloaded[0].extracted);
    assert!(reloaded[0].valid);
    assert_eq!(reloaded[0].validation_errors, None);
    assert_eq!(reloaded[1], untouched);

    let payload: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("I1.json")).unwrap()).unwrap();
    assert_eq!(payload["incident_id"], "I1");
}
