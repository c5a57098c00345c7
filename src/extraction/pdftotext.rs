//! Poppler-based extractor (`pdfinfo` + `pdftotext`).

use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use super::{ExtractionError, PdfText, TextExtractor};

const POPPLER_HINT: &str = "(install poppler-utils)";

/// Handle command output, extracting stdout on success or returning appropriate error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::ExtractionFailed(format!(
                    "{}: {}",
                    error_prefix,
                    stderr.trim()
                )))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExtractionError::ToolNotFound(
            format!("{} {}", tool_name, POPPLER_HINT),
        )),
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Page count from `pdfinfo` output.
fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}

/// Extracts text page by page with poppler's command-line tools.
#[derive(Debug, Clone, Default)]
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn page_count(&self, pdf_path: &Path) -> Result<u32, ExtractionError> {
        let output = Command::new("pdfinfo").arg(pdf_path).output();
        let info = handle_cmd_output(output, "pdfinfo", "pdfinfo failed")?;
        parse_page_count(&info).ok_or_else(|| {
            ExtractionError::ExtractionFailed("pdfinfo reported no page count".to_string())
        })
    }

    fn page_text(&self, pdf_path: &Path, page: u32) -> Result<String, ExtractionError> {
        let page_str = page.to_string();
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg("-") // Output to stdout
            .output();

        handle_cmd_output(
            output,
            "pdftotext",
            &format!("pdftotext failed on page {}", page),
        )
    }
}

impl TextExtractor for PdftotextExtractor {
    fn name(&self) -> &str {
        "pdftotext"
    }

    fn extract(&self, pdf_path: &Path, text_path: &Path) -> Result<PdfText, ExtractionError> {
        if !pdf_path.exists() {
            return Err(ExtractionError::NotFound);
        }
        if let Some(parent) = text_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let page_count = self.page_count(pdf_path)?;
        let mut pages = Vec::with_capacity(page_count as usize);

        for page in 1..=page_count {
            match self.page_text(pdf_path, page) {
                Ok(text) => pages.push(text),
                Err(e @ ExtractionError::ToolNotFound(_)) => return Err(e),
                Err(e) => {
                    warn!("Page {} extraction failed: {}", page, e);
                    pages.push(String::new());
                }
            }
        }

        let text = PdfText::from_pages(&pages);
        std::fs::write(text_path, &text.text)?;
        debug!(
            "Extracted {} pages, {} chars from {}",
            text.page_count,
            text.char_count,
            pdf_path.display()
        );
        Ok(text)
    }
}
