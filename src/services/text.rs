//! Text extraction stage over the acquisition manifest.

use std::path::Path;

use tracing::{info, warn};

use crate::extraction::TextExtractor;
use crate::models::{derive_text_path, timestamp_now, AcquisitionRecord, ExtractionRecord};

/// Counts for one extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextSummary {
    pub total: usize,
    pub extracted: usize,
    pub empty: usize,
    pub failed: usize,
}

impl TextSummary {
    pub fn of(records: &[ExtractionRecord]) -> Self {
        Self {
            total: records.len(),
            extracted: records.iter().filter(|r| r.extracted).count(),
            empty: records.iter().filter(|r| r.is_empty).count(),
            failed: records.iter().filter(|r| !r.extracted).count(),
        }
    }
}

/// Extract text for every downloaded record.
///
/// PDFs and text files live under `raw_dir`; text goes to the path derived
/// from each record's `pdf_path`. Records not yet downloaded are skipped.
/// Per-record failures are captured in the returned rows.
pub fn extract_manifest(
    records: &[AcquisitionRecord],
    raw_dir: &Path,
    extractor: &dyn TextExtractor,
) -> Vec<ExtractionRecord> {
    let mut rows = Vec::new();

    for record in records.iter().filter(|r| r.downloaded) {
        let pdf_path = raw_dir.join(&record.pdf_path);
        let text_path = raw_dir.join(derive_text_path(&record.pdf_path));

        let (page_count, char_count, error) = match extractor.extract(&pdf_path, &text_path) {
            Ok(text) => (text.page_count, text.char_count, None),
            Err(e) => (0, 0, Some(e.to_string())),
        };

        let row = ExtractionRecord::for_acquisition(
            record,
            extractor.name(),
            timestamp_now(),
            page_count,
            char_count,
            error,
        );

        match &row.error {
            Some(error) => warn!("{}: extraction failed - {}", row.incident_id, error),
            None if row.is_empty => {
                warn!("{}: extracted 0 chars (scanned PDF?)", row.incident_id)
            }
            None => info!(
                "{}: {} pages, {} chars",
                row.incident_id, page_count, char_count
            ),
        }

        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ExtractionError, PdfText};
    use crate::models::IncidentSource;
    use tempfile::tempdir;

    /// Reads the "PDF" as UTF-8 and treats form feeds as page breaks.
    struct PlainExtractor;

    impl TextExtractor for PlainExtractor {
        fn name(&self) -> &str {
            "plain"
        }

        fn extract(&self, pdf_path: &Path, text_path: &Path) -> Result<PdfText, ExtractionError> {
            if !pdf_path.exists() {
                return Err(ExtractionError::NotFound);
            }
            let raw = std::fs::read_to_string(pdf_path)?;
            let pages: Vec<String> = raw.split('\x0c').map(str::to_string).collect();
            let text = PdfText::from_pages(&pages);
            std::fs::create_dir_all(text_path.parent().unwrap())?;
            std::fs::write(text_path, &text.text)?;
            Ok(text)
        }
    }

    fn downloaded(id: &str, downloaded: bool) -> AcquisitionRecord {
        let mut record = AcquisitionRecord::discovered(
            IncidentSource::Csb,
            id,
            "Test",
            "",
            "",
            format!("csb/pdfs/{}.pdf", id),
        );
        record.downloaded = downloaded;
        record
    }

    #[test]
    fn test_skips_not_downloaded() {
        let dir = tempdir().unwrap();
        let rows = extract_manifest(&[downloaded("test-1", false)], dir.path(), &PlainExtractor);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_extracts_to_derived_path() {
        let dir = tempdir().unwrap();
        let pdfs = dir.path().join("csb/pdfs");
        std::fs::create_dir_all(&pdfs).unwrap();
        std::fs::write(pdfs.join("report.pdf"), "first page\x0csecond page").unwrap();
        std::fs::write(pdfs.join("blank.pdf"), "").unwrap();

        let records = vec![
            downloaded("report", true),
            downloaded("blank", true),
            downloaded("gone", true),
        ];
        let rows = extract_manifest(&records, dir.path(), &PlainExtractor);
        assert_eq!(rows.len(), 3);

        let report = &rows[0];
        assert!(report.extracted);
        assert_eq!(report.text_path, "csb/text/report.txt");
        assert_eq!(report.extractor_name, "plain");
        assert_eq!(report.page_count, Some(2));
        assert!(!report.is_empty);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("csb/text/report.txt")).unwrap(),
            "first page\n\nsecond page"
        );

        assert!(rows[1].extracted);
        assert!(rows[1].is_empty);

        assert!(!rows[2].extracted);
        assert_eq!(rows[2].error.as_deref(), Some("PDF not found"));
        assert!(rows[2].is_empty);

        let summary = TextSummary::of(&rows);
        assert_eq!(summary.extracted, 2);
        assert_eq!(summary.empty, 2);
        assert_eq!(summary.failed, 1);
    }
}
