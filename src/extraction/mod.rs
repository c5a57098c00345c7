//! PDF text extraction.

mod pdftotext;

pub use pdftotext::PdftotextExtractor;

use std::path::Path;

use thiserror::Error;

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF not found")]
    NotFound,

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text pulled from one PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfText {
    pub text: String,
    pub page_count: u32,
    /// Length of `text` in characters.
    pub char_count: u64,
}

impl PdfText {
    /// Join per-page text with blank lines, trimming each page's trailing
    /// whitespace.
    pub fn from_pages(pages: &[String]) -> Self {
        let text = pages
            .iter()
            .map(|p| p.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            char_count: text.chars().count() as u64,
            page_count: pages.len() as u32,
            text,
        }
    }
}

/// Converts a PDF on disk into plain text.
pub trait TextExtractor: Send + Sync {
    /// Name recorded in the text manifest's `extractor` column.
    fn name(&self) -> &str;

    /// Extract `pdf_path` and write the text to `text_path`.
    ///
    /// The parent directory of `text_path` is created before extraction
    /// starts, even if extraction then fails.
    fn extract(&self, pdf_path: &Path, text_path: &Path) -> Result<PdfText, ExtractionError>;
}
