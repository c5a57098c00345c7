//! Manifest record models for incident acquisition and extraction tracking.
//!
//! Each record type maps one-to-one onto a row of a CSV manifest. Optional
//! values are `Option<T>` here; the empty-string-for-absent convention only
//! exists inside the codec.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Regulatory body an incident report was published by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSource {
    /// US Chemical Safety and Hazard Investigation Board.
    Csb,
    /// US Bureau of Safety and Environmental Enforcement.
    Bsee,
}

impl IncidentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csb => "csb",
            Self::Bsee => "bsee",
        }
    }

    pub fn all() -> &'static [IncidentSource] {
        &[Self::Csb, Self::Bsee]
    }
}

impl fmt::Display for IncidentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csb" => Ok(Self::Csb),
            "bsee" => Ok(Self::Bsee),
            other => Err(format!("unknown incident source: {}", other)),
        }
    }
}

/// Lenient boolean parsing: accepts `true`/`false` in any case, treats an
/// empty cell as false.
pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else {
        Err(serde::de::Error::custom(format!(
            "expected true or false, found {:?}",
            raw
        )))
    }
}

/// Current UTC time for manifest timestamps.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now()
}

/// Optional RFC 3339 timestamps at full precision.
///
/// Fractional seconds are written with as many digits as needed (none, 3, 6
/// or 9). Any offset is accepted on input and normalized to UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {:?}: {}", text, e))),
        }
    }
}

fn default_extractor() -> String {
    "default".to_string()
}

/// One discovered incident and its download progress.
///
/// Row in `incidents_manifest_v0.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    pub source: IncidentSource,
    /// Unique only within `source`.
    pub incident_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date_occurred: Option<String>,
    #[serde(default)]
    pub date_report_released: Option<String>,
    #[serde(default)]
    pub detail_url: String,
    #[serde(default)]
    pub pdf_url: String,
    /// Relative to the raw data directory, e.g. `csb/pdfs/report.pdf`.
    #[serde(default)]
    pub pdf_path: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub downloaded: bool,
    #[serde(default, with = "timestamp")]
    pub retrieved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    /// Hex-encoded SHA-256 of the downloaded bytes.
    #[serde(default, rename = "sha256", alias = "content_hash")]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AcquisitionRecord {
    /// Column header, in field declaration order.
    pub const COLUMNS: &'static [&'static str] = &[
        "source",
        "incident_id",
        "title",
        "date_occurred",
        "date_report_released",
        "detail_url",
        "pdf_url",
        "pdf_path",
        "downloaded",
        "retrieved_at",
        "http_status",
        "content_type",
        "file_size_bytes",
        "sha256",
        "error",
    ];

    /// Create a freshly discovered record with no download state.
    pub fn discovered(
        source: IncidentSource,
        incident_id: impl Into<String>,
        title: impl Into<String>,
        detail_url: impl Into<String>,
        pdf_url: impl Into<String>,
        pdf_path: impl Into<String>,
    ) -> Self {
        Self {
            source,
            incident_id: incident_id.into(),
            title: title.into(),
            date_occurred: None,
            date_report_released: None,
            detail_url: detail_url.into(),
            pdf_url: pdf_url.into(),
            pdf_path: pdf_path.into(),
            downloaded: false,
            retrieved_at: None,
            http_status: None,
            content_type: None,
            file_size_bytes: None,
            content_hash: None,
            error: None,
        }
    }

    /// Relative storage path for a source's PDF: `{source}/pdfs/{filename}`.
    pub fn pdf_path_for(source: IncidentSource, filename: &str) -> String {
        format!("{}/pdfs/{}", source.as_str(), filename)
    }

    pub fn with_date_occurred(mut self, date: Option<String>) -> Self {
        self.date_occurred = date;
        self
    }

    pub fn with_date_report_released(mut self, date: Option<String>) -> Self {
        self.date_report_released = date;
        self
    }

    /// Copy of this record marking a completed download.
    pub fn with_download(
        &self,
        retrieved_at: DateTime<Utc>,
        http_status: u16,
        content_type: Option<String>,
        file_size_bytes: u64,
        content_hash: String,
    ) -> Self {
        Self {
            downloaded: true,
            retrieved_at: Some(retrieved_at),
            http_status: Some(http_status),
            content_type,
            file_size_bytes: Some(file_size_bytes),
            content_hash: Some(content_hash),
            error: None,
            ..self.clone()
        }
    }

    /// Copy of this record marking a failed download attempt.
    ///
    /// `http_status` and `content_type` are recorded when a response arrived.
    pub fn with_failure(
        &self,
        retrieved_at: DateTime<Utc>,
        http_status: Option<u16>,
        content_type: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            downloaded: false,
            retrieved_at: Some(retrieved_at),
            http_status,
            content_type,
            error,
            ..self.clone()
        }
    }
}

/// Convert a PDF path into its extracted text path.
///
/// `csb/pdfs/report.pdf` becomes `csb/text/report.txt`. Only the first `pdfs`
/// segment is replaced; backslashes are normalized to forward slashes.
pub fn derive_text_path(pdf_path: &str) -> String {
    let normalized = pdf_path.replace('\\', "/");
    let mut replaced = false;
    let parts: Vec<&str> = normalized
        .split('/')
        .map(|part| {
            if !replaced && part == "pdfs" {
                replaced = true;
                "text"
            } else {
                part
            }
        })
        .collect();

    let joined = parts.join("/");
    match joined.strip_suffix(".pdf") {
        Some(stem) => format!("{}.txt", stem),
        None => joined,
    }
}

/// One incident's text-extraction outcome.
///
/// Row in `text_manifest_v0.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub source: IncidentSource,
    pub incident_id: String,
    #[serde(default)]
    pub pdf_path: String,
    #[serde(default)]
    pub text_path: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub extracted: bool,
    #[serde(default, with = "timestamp")]
    pub extracted_at: Option<DateTime<Utc>>,
    #[serde(default = "default_extractor", rename = "extractor")]
    pub extractor_name: String,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub char_count: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_empty: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExtractionRecord {
    pub const COLUMNS: &'static [&'static str] = &[
        "source",
        "incident_id",
        "pdf_path",
        "text_path",
        "extracted",
        "extracted_at",
        "extractor",
        "page_count",
        "char_count",
        "is_empty",
        "error",
    ];

    /// Build the extraction outcome for an acquisition record.
    ///
    /// `is_empty` is derived from `char_count`; `extracted` from the absence of
    /// an error.
    pub fn for_acquisition(
        record: &AcquisitionRecord,
        extractor_name: &str,
        extracted_at: DateTime<Utc>,
        page_count: u32,
        char_count: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            source: record.source,
            incident_id: record.incident_id.clone(),
            pdf_path: record.pdf_path.clone(),
            text_path: derive_text_path(&record.pdf_path),
            extracted: error.is_none(),
            extracted_at: Some(extracted_at),
            extractor_name: extractor_name.to_string(),
            page_count: Some(page_count),
            char_count: Some(char_count),
            is_empty: char_count == 0,
            error,
        }
    }
}

/// One incident's LLM-structuring outcome.
///
/// Row in `structured_manifest.csv`. Identity is `incident_id` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub incident_id: String,
    #[serde(default)]
    pub source_text_path: String,
    #[serde(default)]
    pub output_json_path: String,
    #[serde(default, rename = "provider")]
    pub provider_name: String,
    #[serde(default, rename = "model")]
    pub model_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub extracted: bool,
    #[serde(default, with = "timestamp")]
    pub extracted_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub valid: bool,
    #[serde(default)]
    pub validation_errors: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub raw_response_path: Option<String>,
}

impl StructuredRecord {
    pub const COLUMNS: &'static [&'static str] = &[
        "incident_id",
        "source_text_path",
        "output_json_path",
        "provider",
        "model",
        "extracted",
        "extracted_at",
        "valid",
        "validation_errors",
        "error",
        "raw_response_path",
    ];

    /// Maximum number of validation messages kept in `validation_errors`.
    pub const MAX_VALIDATION_ERRORS: usize = 5;

    /// A pending row for one text file, before the provider is called.
    pub fn pending(
        incident_id: impl Into<String>,
        source_text_path: impl Into<String>,
        output_json_path: impl Into<String>,
        provider_name: impl Into<String>,
        model_name: Option<String>,
    ) -> Self {
        Self {
            incident_id: incident_id.into(),
            source_text_path: source_text_path.into(),
            output_json_path: output_json_path.into(),
            provider_name: provider_name.into(),
            model_name,
            extracted: false,
            extracted_at: None,
            valid: false,
            validation_errors: None,
            error: None,
            raw_response_path: None,
        }
    }

    /// Join the first few validation messages into the manifest column value.
    pub fn summarize_errors(errors: &[String]) -> Option<String> {
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .take(Self::MAX_VALIDATION_ERRORS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_derive_text_path() {
        assert_eq!(derive_text_path("csb/pdfs/report.pdf"), "csb/text/report.txt");
        assert_eq!(derive_text_path("bsee\\pdfs\\a.pdf"), "bsee/text/a.txt");
        // Only the first pdfs segment is rewritten
        assert_eq!(derive_text_path("pdfs/pdfs/x.pdf"), "text/pdfs/x.txt");
        // Non-pdf extension is left alone
        assert_eq!(derive_text_path("csb/pdfs/readme.md"), "csb/text/readme.md");
    }

    #[test]
    fn test_incident_source_parse() {
        assert_eq!("CSB".parse::<IncidentSource>(), Ok(IncidentSource::Csb));
        assert_eq!("bsee".parse::<IncidentSource>(), Ok(IncidentSource::Bsee));
        assert!("osha".parse::<IncidentSource>().is_err());
    }

    #[test]
    fn test_with_download_keeps_descriptive_fields() {
        let record = AcquisitionRecord::discovered(
            IncidentSource::Csb,
            "x",
            "Platform Fire",
            "https://csb.gov/x/",
            "https://csb.gov/x.pdf",
            "csb/pdfs/x.pdf",
        );
        let when = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let done = record.with_download(when, 200, None, 100, "abc".to_string());

        assert!(done.downloaded);
        assert_eq!(done.title, "Platform Fire");
        assert_eq!(done.content_hash.as_deref(), Some("abc"));
        // Original untouched
        assert!(!record.downloaded);
    }

    #[test]
    fn test_extraction_is_empty_follows_char_count() {
        let record = AcquisitionRecord::discovered(
            IncidentSource::Bsee,
            "b1",
            "",
            "",
            "",
            "bsee/pdfs/b1.pdf",
        );
        let now = Utc::now();
        let empty = ExtractionRecord::for_acquisition(&record, "pdftotext", now, 3, 0, None);
        assert!(empty.is_empty);
        assert!(empty.extracted);
        assert_eq!(empty.text_path, "bsee/text/b1.txt");

        let failed = ExtractionRecord::for_acquisition(
            &record,
            "pdftotext",
            now,
            0,
            0,
            Some("PDF not found".to_string()),
        );
        assert!(!failed.extracted);
    }

    #[test]
    fn test_summarize_errors_caps_at_five() {
        let errors: Vec<String> = (1..=7).map(|i| format!("e{}", i)).collect();
        assert_eq!(
            StructuredRecord::summarize_errors(&errors).as_deref(),
            Some("e1; e2; e3; e4; e5")
        );
        assert_eq!(StructuredRecord::summarize_errors(&[]), None);
    }
}
