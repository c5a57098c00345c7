//! Incident discovery producers for regulator report sites.

pub mod bsee;
pub mod csb;
mod http_client;

pub use bsee::{BseeProducer, BSEE_BASE_URL};
pub use csb::{CsbProducer, CSB_BASE_URL};
pub use http_client::{resolve_user_agent, HttpClient, HttpResponse, USER_AGENT};

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::models::{AcquisitionRecord, IncidentSource};

/// Maximum slug length in characters.
const MAX_SLUG_LEN: usize = 50;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").unwrap());

/// A source of freshly discovered incidents.
///
/// Every record produced has `downloaded = false` and no download state.
/// Discovery is finite and can be re-run; failures are logged, not raised.
#[async_trait]
pub trait IncidentProducer: Send + Sync {
    /// The regulator this producer scrapes.
    fn source(&self) -> IncidentSource;

    /// Discover up to `limit` incidents.
    async fn discover(&self, limit: usize) -> Vec<AcquisitionRecord>;
}

/// Convert text to a URL-safe slug of at most 50 characters.
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, "");
    let slug = SEPARATORS.replace_all(&cleaned, "-");
    slug.chars().take(MAX_SLUG_LEN).collect()
}

/// Last path segment of a URL.
pub fn extract_filename_from_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or("").to_string()
}

/// A hyperlink found in a page, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub url: Url,
    pub text: String,
}

/// Collect every `<a href>` in a document, resolved against `base`.
///
/// Unresolvable hrefs are skipped. Link text is whitespace-collapsed.
pub fn collect_links(html: &str, base: &Url) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?.trim();
            let url = base.join(href).ok()?;
            let text = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            Some(PageLink { url, text })
        })
        .collect()
}

/// Whether a link points at a PDF by its path.
pub fn is_pdf_link(url: &Url) -> bool {
    url.path().to_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Refinery Explosion & Fire  "), "refinery-explosion-fire");
        assert_eq!(slugify("Unit 3 -- Hydrocracker"), "unit-3-hydrocracker");
        assert_eq!(slugify("ABC_def"), "abc_def");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_slugify_truncates() {
        let long = "a".repeat(80);
        assert_eq!(slugify(&long).chars().count(), 50);
    }

    #[test]
    fn test_extract_filename_from_url() {
        assert_eq!(
            extract_filename_from_url("https://www.csb.gov/assets/1/20/final_report.pdf"),
            "final_report.pdf"
        );
        assert_eq!(extract_filename_from_url("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_collect_links_resolves_relative() {
        let base = Url::parse("https://www.csb.gov/investigations/").unwrap();
        let html = r#"<a href="/file-library/a.pdf">Final
            Report</a><a href="https://other.org/b">B</a>"#;
        let links = collect_links(html, &base);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url.as_str(), "https://www.csb.gov/file-library/a.pdf");
        assert_eq!(links[0].text, "Final Report");
        assert!(is_pdf_link(&links[0].url));
        assert!(!is_pdf_link(&links[1].url));
    }
}
