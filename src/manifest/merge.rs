//! Reconciliation of manifest record sets across pipeline runs.
//!
//! Discovery passes are repeated and may observe the same incident many times.
//! Merging never loses acquisition progress: a record that has been downloaded
//! and hashed is only replaced by one the conflict policy ranks at least as
//! high, and descriptive fields are back-filled from whichever side has them.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{AcquisitionRecord, ExtractionRecord, IncidentSource, StructuredRecord};

/// Second half of a merge key.
///
/// URL and id keys are distinct variants, so a `pdf_url` equal to some other
/// record's `incident_id` never collides with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Discriminator {
    PdfUrl(String),
    IncidentId(String),
}

/// Identity of an acquisition record for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub source: IncidentSource,
    pub discriminator: Discriminator,
}

impl MergeKey {
    /// Keyed by PDF URL when known, falling back to the incident id.
    pub fn of(record: &AcquisitionRecord) -> Self {
        let discriminator = if record.pdf_url.is_empty() {
            Discriminator::IncidentId(record.incident_id.clone())
        } else {
            Discriminator::PdfUrl(record.pdf_url.clone())
        };
        Self {
            source: record.source,
            discriminator,
        }
    }
}

/// Which of two records carrying the same key should survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    AWins,
    BWins,
    Tie,
}

impl From<Ordering> for Resolution {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Greater => Resolution::AWins,
            Ordering::Less => Resolution::BWins,
            Ordering::Equal => Resolution::Tie,
        }
    }
}

fn compare_timestamps(a: Option<&DateTime<Utc>>, b: Option<&DateTime<Utc>>) -> Ordering {
    // Option orders None below Some, which is exactly "present outranks absent".
    a.cmp(&b)
}

/// An empty hash is stored as an empty cell, so it counts as absent.
fn has_hash(record: &AcquisitionRecord) -> bool {
    record.content_hash.as_deref().is_some_and(|h| !h.is_empty())
}

/// Rank two records by acquisition progress.
///
/// The first rule that distinguishes them decides:
/// 1. downloaded over not downloaded
/// 2. later `retrieved_at` (any timestamp over none)
/// 3. a content hash over none
/// 4. larger `file_size_bytes` (any size over none)
///
/// Records equal on every rule are a [`Resolution::Tie`].
pub fn resolve_conflict(a: &AcquisitionRecord, b: &AcquisitionRecord) -> Resolution {
    let ordering = a
        .downloaded
        .cmp(&b.downloaded)
        .then_with(|| compare_timestamps(a.retrieved_at.as_ref(), b.retrieved_at.as_ref()))
        .then_with(|| has_hash(a).cmp(&has_hash(b)))
        .then_with(|| a.file_size_bytes.cmp(&b.file_size_bytes));
    Resolution::from(ordering)
}

fn fill_string(winner: &mut String, loser: &str) {
    if winner.is_empty() && !loser.is_empty() {
        *winner = loser.to_string();
    }
}

fn fill_option(winner: &mut Option<String>, loser: &Option<String>) {
    let winner_empty = winner.as_deref().map_or(true, str::is_empty);
    if winner_empty {
        if let Some(value) = loser.as_deref().filter(|v| !v.is_empty()) {
            *winner = Some(value.to_string());
        }
    }
}

/// Back-fill the winner's missing descriptive fields from the loser.
///
/// Only `title`, `date_occurred`, `date_report_released`, `detail_url` and
/// `pdf_path` are eligible. Download state and identity always stay the
/// winner's.
pub fn enrich(winner: &AcquisitionRecord, loser: &AcquisitionRecord) -> AcquisitionRecord {
    let mut result = winner.clone();
    fill_string(&mut result.title, &loser.title);
    fill_option(&mut result.date_occurred, &loser.date_occurred);
    fill_option(&mut result.date_report_released, &loser.date_report_released);
    fill_string(&mut result.detail_url, &loser.detail_url);
    fill_string(&mut result.pdf_path, &loser.pdf_path);
    result
}

/// Counts describing what a merge did, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Incoming records with no existing counterpart.
    pub inserted: usize,
    /// Existing records superseded by an incoming one.
    pub replaced: usize,
    /// Existing records that outranked or tied an incoming one.
    pub kept: usize,
    /// Surviving records that gained descriptive fields from the other side.
    pub enriched: usize,
}

impl MergeSummary {
    pub fn total_incoming(&self) -> usize {
        self.inserted + self.replaced + self.kept
    }
}

/// Result of merging two record sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome<T> {
    pub records: Vec<T>,
    pub summary: MergeSummary,
}

fn acquisition_sort_key(record: &AcquisitionRecord) -> (IncidentSource, &str, &str) {
    (record.source, &record.incident_id, &record.pdf_url)
}

/// Merge freshly observed acquisition records into the existing set.
///
/// Existing records are indexed by [`MergeKey`]; duplicates within `existing`
/// collapse to the last occurrence. Each incoming record is inserted if its key
/// is new, otherwise the conflict policy picks the survivor and the loser's
/// descriptive fields are used to enrich it. Ties keep the existing record.
///
/// The output is sorted by `(source, incident_id, pdf_url)`.
pub fn merge_acquisition(
    existing: &[AcquisitionRecord],
    incoming: &[AcquisitionRecord],
) -> MergeOutcome<AcquisitionRecord> {
    let mut index: HashMap<MergeKey, AcquisitionRecord> = HashMap::new();
    for record in existing {
        index.insert(MergeKey::of(record), record.clone());
    }

    let mut summary = MergeSummary::default();

    for record in incoming {
        let key = MergeKey::of(record);
        let merged = match index.get(&key) {
            None => {
                summary.inserted += 1;
                record.clone()
            }
            Some(current) => {
                let (winner, loser) = match resolve_conflict(record, current) {
                    Resolution::AWins => {
                        summary.replaced += 1;
                        (record, current)
                    }
                    Resolution::BWins | Resolution::Tie => {
                        summary.kept += 1;
                        (current, record)
                    }
                };
                let merged = enrich(winner, loser);
                if &merged != winner {
                    summary.enriched += 1;
                }
                merged
            }
        };
        index.insert(key, merged);
    }

    let mut records: Vec<AcquisitionRecord> = index.into_values().collect();
    records.sort_by(|a, b| acquisition_sort_key(a).cmp(&acquisition_sort_key(b)));

    MergeOutcome { records, summary }
}

/// Upsert structured rows by `incident_id`; incoming rows always win.
///
/// Output is sorted by `incident_id`.
pub fn merge_structured(
    existing: &[StructuredRecord],
    incoming: &[StructuredRecord],
) -> MergeOutcome<StructuredRecord> {
    let mut index: HashMap<String, StructuredRecord> = existing
        .iter()
        .map(|r| (r.incident_id.clone(), r.clone()))
        .collect();

    let mut summary = MergeSummary::default();
    for record in incoming {
        match index.insert(record.incident_id.clone(), record.clone()) {
            Some(_) => summary.replaced += 1,
            None => summary.inserted += 1,
        }
    }

    let mut records: Vec<StructuredRecord> = index.into_values().collect();
    records.sort_by(|a, b| a.incident_id.cmp(&b.incident_id));

    MergeOutcome { records, summary }
}

/// Upsert extraction rows by `(source, incident_id)`; incoming rows always win.
pub fn merge_extraction(
    existing: &[ExtractionRecord],
    incoming: &[ExtractionRecord],
) -> MergeOutcome<ExtractionRecord> {
    let mut index: HashMap<(IncidentSource, String), ExtractionRecord> = existing
        .iter()
        .map(|r| ((r.source, r.incident_id.clone()), r.clone()))
        .collect();

    let mut summary = MergeSummary::default();
    for record in incoming {
        match index.insert((record.source, record.incident_id.clone()), record.clone()) {
            Some(_) => summary.replaced += 1,
            None => summary.inserted += 1,
        }
    }

    let mut records: Vec<ExtractionRecord> = index.into_values().collect();
    records.sort_by(|a, b| (a.source, &a.incident_id).cmp(&(b.source, &b.incident_id)));

    MergeOutcome { records, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(source: IncidentSource, id: &str, pdf_url: &str) -> AcquisitionRecord {
        AcquisitionRecord::discovered(
            source,
            id,
            "",
            "",
            pdf_url,
            AcquisitionRecord::pdf_path_for(source, &format!("{}.pdf", id)),
        )
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    fn downloaded(base: &AcquisitionRecord, day: u32, hash: &str, size: u64) -> AcquisitionRecord {
        base.with_download(
            at(day),
            200,
            Some("application/pdf".to_string()),
            size,
            hash.to_string(),
        )
    }

    #[test]
    fn test_merge_key_prefers_pdf_url() {
        let with_url = record(IncidentSource::Csb, "a", "https://x/a.pdf");
        let without_url = record(IncidentSource::Csb, "a", "");

        assert_eq!(
            MergeKey::of(&with_url).discriminator,
            Discriminator::PdfUrl("https://x/a.pdf".to_string())
        );
        assert_eq!(
            MergeKey::of(&without_url).discriminator,
            Discriminator::IncidentId("a".to_string())
        );
    }

    #[test]
    fn test_url_and_id_keys_never_collide() {
        let by_url = record(IncidentSource::Csb, "other", "same");
        let by_id = record(IncidentSource::Csb, "same", "");
        assert_ne!(MergeKey::of(&by_url), MergeKey::of(&by_id));

        let outcome = merge_acquisition(&[by_url], &[by_id]);
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn test_downloaded_outranks_everything() {
        let base = record(IncidentSource::Csb, "a", "u");
        let done = downloaded(&base, 1, "h", 1);
        let later_failure = base.with_failure(at(20), Some(500), None, Some("HTTP 500".into()));

        assert_eq!(resolve_conflict(&done, &later_failure), Resolution::AWins);
        assert_eq!(resolve_conflict(&later_failure, &done), Resolution::BWins);
    }

    #[test]
    fn test_later_retrieval_wins() {
        let base = record(IncidentSource::Csb, "a", "u");
        let early = downloaded(&base, 1, "h1", 100);
        let late = downloaded(&base, 2, "h2", 50);
        assert_eq!(resolve_conflict(&late, &early), Resolution::AWins);

        // Present timestamp beats absent
        let attempted = base.with_failure(at(1), None, None, Some("timeout".into()));
        assert_eq!(resolve_conflict(&base, &attempted), Resolution::BWins);
    }

    #[test]
    fn test_equal_retrieval_falls_through_to_hash_and_size() {
        let base = record(IncidentSource::Bsee, "a", "u");
        let small = downloaded(&base, 3, "h", 10);
        let large = downloaded(&base, 3, "h", 20);
        assert_eq!(resolve_conflict(&large, &small), Resolution::AWins);

        let mut unhashed = large.clone();
        unhashed.content_hash = None;
        unhashed.file_size_bytes = Some(1_000);
        assert_eq!(resolve_conflict(&small, &unhashed), Resolution::AWins);
    }

    #[test]
    fn test_empty_hash_counts_as_absent() {
        let base = record(IncidentSource::Csb, "a", "u");
        let mut blank = base.clone();
        blank.content_hash = Some(String::new());
        assert_eq!(resolve_conflict(&blank, &base), Resolution::Tie);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.csv");
        crate::manifest::save_records(&path, &[blank.clone(), base.clone()]).unwrap();
        let loaded: Vec<AcquisitionRecord> = crate::manifest::load_records(&path).unwrap();
        assert_eq!(
            resolve_conflict(&loaded[0], &loaded[1]),
            resolve_conflict(&blank, &base)
        );
    }

    #[test]
    fn test_identical_records_tie() {
        let base = record(IncidentSource::Csb, "a", "u");
        assert_eq!(resolve_conflict(&base, &base.clone()), Resolution::Tie);
    }

    #[test]
    fn test_enrich_fills_descriptive_only() {
        let mut winner = record(IncidentSource::Csb, "a", "u");
        winner.pdf_path.clear();
        let mut loser = downloaded(&record(IncidentSource::Csb, "a", "u"), 5, "hash", 10);
        loser.title = "Refinery Explosion".to_string();
        loser.date_occurred = Some("2020-01-01".to_string());
        loser.error = Some("old".to_string());

        let result = enrich(&winner, &loser);
        assert_eq!(result.title, "Refinery Explosion");
        assert_eq!(result.date_occurred.as_deref(), Some("2020-01-01"));
        assert_eq!(result.pdf_path, "csb/pdfs/a.pdf");
        assert!(!result.downloaded);
        assert_eq!(result.content_hash, None);
        assert_eq!(result.retrieved_at, None);
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_enrich_keeps_winner_values() {
        let mut winner = record(IncidentSource::Csb, "a", "u");
        winner.title = "Winner".to_string();
        let mut loser = winner.clone();
        loser.title = "Loser".to_string();
        assert_eq!(enrich(&winner, &loser).title, "Winner");
    }

    #[test]
    fn test_rediscovery_never_regresses_download() {
        let base = record(IncidentSource::Csb, "x", "U");
        let stored = downloaded(&base, 1, "H", 100);

        let mut rediscovered = base.clone();
        rediscovered.title = "New Title".to_string();

        let outcome = merge_acquisition(&[stored.clone()], &[rediscovered]);
        assert_eq!(outcome.records.len(), 1);
        let merged = &outcome.records[0];
        assert!(merged.downloaded);
        assert_eq!(merged.content_hash.as_deref(), Some("H"));
        assert_eq!(merged.retrieved_at, stored.retrieved_at);
        assert_eq!(merged.title, "New Title");
        assert_eq!(outcome.summary.kept, 1);
        assert_eq!(outcome.summary.enriched, 1);
    }

    #[test]
    fn test_newer_download_replaces_and_is_enriched() {
        let mut base = record(IncidentSource::Bsee, "y", "U");
        base.title = "Rig Fire".to_string();
        let old = downloaded(&base, 1, "H1", 10);

        let mut new = downloaded(&record(IncidentSource::Bsee, "y", "U"), 2, "H2", 20);
        new.title.clear();

        let outcome = merge_acquisition(&[old], &[new]);
        let merged = &outcome.records[0];
        assert_eq!(merged.content_hash.as_deref(), Some("H2"));
        assert_eq!(merged.retrieved_at, Some(at(2)));
        assert_eq!(merged.title, "Rig Fire");
        assert_eq!(outcome.summary.replaced, 1);
    }

    #[test]
    fn test_fallback_identity_and_source_isolation() {
        let csb = record(IncidentSource::Csb, "z", "");
        let bsee = record(IncidentSource::Bsee, "z", "");

        let outcome = merge_acquisition(&[csb.clone()], &[bsee.clone()]);
        assert_eq!(outcome.records.len(), 2);

        let outcome = merge_acquisition(&[csb.clone()], &[csb]);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = downloaded(&record(IncidentSource::Csb, "a", "ua"), 1, "h", 1);
        let b = record(IncidentSource::Csb, "b", "ub");
        let c = record(IncidentSource::Bsee, "c", "");
        let set = vec![a, b, c];

        let once = merge_acquisition(&set, &set).records;
        let mut sorted = set.clone();
        sorted.sort_by(|x, y| acquisition_sort_key(x).cmp(&acquisition_sort_key(y)));
        assert_eq!(once, sorted);

        let incoming = vec![record(IncidentSource::Csb, "a", "ua")];
        let first = merge_acquisition(&set, &incoming).records;
        let second = merge_acquisition(&first, &incoming).records;
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_existing_last_wins() {
        let mut first = record(IncidentSource::Csb, "a", "u");
        first.title = "first".to_string();
        let mut second = first.clone();
        second.title = "second".to_string();

        let outcome = merge_acquisition(&[first, second], &[]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].title, "second");
    }

    #[test]
    fn test_merge_structured_incoming_wins() {
        let old = StructuredRecord::pending("INC-1", "a.txt", "a.json", "stub", None);
        let mut new = old.clone();
        new.valid = true;
        new.extracted = true;
        let other = StructuredRecord::pending("INC-0", "b.txt", "b.json", "stub", None);

        let outcome = merge_structured(&[old], &[new.clone(), other]);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].incident_id, "INC-0");
        assert_eq!(outcome.records[1], new);
        assert_eq!(outcome.summary.replaced, 1);
        assert_eq!(outcome.summary.inserted, 1);
    }

    #[test]
    fn test_merge_extraction_keyed_by_source_and_id() {
        let acq = record(IncidentSource::Csb, "a", "u");
        let old = ExtractionRecord::for_acquisition(&acq, "pdftotext", at(1), 1, 0, None);
        let new = ExtractionRecord::for_acquisition(&acq, "pdftotext", at(2), 3, 900, None);
        let other = ExtractionRecord::for_acquisition(
            &record(IncidentSource::Bsee, "a", "u"),
            "pdftotext",
            at(2),
            1,
            5,
            None,
        );

        let outcome = merge_extraction(&[old], &[new.clone(), other]);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0], new);
    }
}
