//! US Chemical Safety Board completed-investigation discovery.
//!
//! Walks the paginated listing, follows each investigation's detail page and
//! picks its final report PDF.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use tracing::{error, info, warn};
use url::Url;

use super::{collect_links, extract_filename_from_url, is_pdf_link, slugify, HttpClient, IncidentProducer};
use crate::models::{AcquisitionRecord, IncidentSource};

pub const CSB_BASE_URL: &str = "https://www.csb.gov";
const COMPLETED_PATH: &str = "/investigations/completed-investigations/";

/// Listing and category pages that look like investigation links but aren't.
const INDEX_PATHS: &[&str] = &[
    "/investigations/",
    "/investigations/completed-investigations/",
    "/investigations/current-investigations/",
];

const REPORT_KEYWORDS: &[&str] = &["final", "report", "investigation"];
const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d"];

static DATE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+ \d{1,2}, \d{4})").unwrap());

/// An investigation linked from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub detail_url: String,
    pub title: String,
}

/// Parse a CSB date ("January 15, 2024", "Jan 15, 2024" or ISO) to `YYYY-MM-DD`.
pub fn parse_csb_date(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// First parseable date mentioned on a page.
pub fn find_date(html: &str) -> Option<String> {
    DATE_TEXT
        .captures_iter(html)
        .find_map(|caps| parse_csb_date(&caps[1]))
}

/// Investigation links on a listing page, in page order, without duplicates.
pub fn parse_listing(html: &str, base: &Url) -> Vec<ListingEntry> {
    let mut seen = HashSet::new();
    collect_links(html, base)
        .into_iter()
        .filter(|link| link.url.host_str() == base.host_str())
        .filter(|link| {
            let path = link.url.path();
            path.starts_with("/investigations/")
                && path.ends_with('/')
                && !INDEX_PATHS.contains(&path)
        })
        .filter(|link| !link.text.is_empty())
        .filter(|link| seen.insert(link.url.to_string()))
        .map(|link| ListingEntry {
            detail_url: link.url.to_string(),
            title: link.text,
        })
        .collect()
}

/// Whether a listing page has anything worth following.
fn page_has_content(html: &str, base: &Url) -> bool {
    !parse_listing(html, base).is_empty()
        || collect_links(html, base).iter().any(|l| is_pdf_link(&l.url))
}

/// Pick the report PDF from a detail page.
///
/// Prefers the first PDF whose URL mentions a report keyword, otherwise the
/// first PDF on the page.
pub fn select_report_pdf(html: &str, base: &Url) -> Option<String> {
    let pdfs: Vec<Url> = collect_links(html, base)
        .into_iter()
        .map(|link| link.url)
        .filter(is_pdf_link)
        .collect();

    pdfs.iter()
        .find(|url| {
            let lowered = url.as_str().to_lowercase();
            REPORT_KEYWORDS.iter().any(|kw| lowered.contains(kw))
        })
        .or_else(|| pdfs.first())
        .map(|url| url.to_string())
}

/// Build the discovered record for one investigation.
pub fn build_record(
    entry: &ListingEntry,
    pdf_url: String,
    date_occurred: Option<String>,
    ordinal: usize,
) -> AcquisitionRecord {
    let mut incident_id = slugify(&entry.title);
    if incident_id.is_empty() {
        incident_id = format!("csb-{}", ordinal);
    }

    let mut filename = extract_filename_from_url(&pdf_url);
    if !filename.to_lowercase().ends_with(".pdf") {
        filename = format!("{}.pdf", incident_id);
    }

    AcquisitionRecord::discovered(
        IncidentSource::Csb,
        incident_id,
        entry.title.clone(),
        entry.detail_url.clone(),
        pdf_url,
        AcquisitionRecord::pdf_path_for(IncidentSource::Csb, &filename),
    )
    .with_date_occurred(date_occurred)
}

/// Discovery producer for CSB completed investigations.
pub struct CsbProducer {
    client: HttpClient,
    base_url: Url,
}

impl CsbProducer {
    pub fn new(client: HttpClient, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn listing_url(&self, page: usize) -> Option<Url> {
        let mut url = self.base_url.join(COMPLETED_PATH).ok()?;
        url.set_query(Some(&format!("pg={}", page)));
        Some(url)
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        match self.client.get(url).await {
            Ok(response) if response.is_ok() => match response.text().await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Failed to read {}: {}", url, e);
                    None
                }
            },
            Ok(response) => {
                warn!("{} returned {}", url, response.status);
                None
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }

    async fn discover_entry(&self, entry: &ListingEntry, ordinal: usize) -> Option<AcquisitionRecord> {
        let html = self.fetch_page(&entry.detail_url).await?;
        let detail_base = Url::parse(&entry.detail_url).unwrap_or_else(|_| self.base_url.clone());
        let pdf_url = select_report_pdf(&html, &detail_base)?;
        let date_occurred = find_date(&html);
        Some(build_record(entry, pdf_url, date_occurred, ordinal))
    }
}

#[async_trait]
impl IncidentProducer for CsbProducer {
    fn source(&self) -> IncidentSource {
        IncidentSource::Csb
    }

    async fn discover(&self, limit: usize) -> Vec<AcquisitionRecord> {
        let mut records = Vec::new();
        let mut seen_details = HashSet::new();
        let mut page = 1;

        while records.len() < limit {
            let Some(url) = self.listing_url(page) else {
                error!("Invalid CSB base URL: {}", self.base_url);
                break;
            };
            info!("Fetching CSB page {}: {}", page, url);

            let Some(html) = self.fetch_page(url.as_str()).await else {
                break;
            };

            if !page_has_content(&html, &url) {
                info!("No more investigations found on page {}", page);
                break;
            }

            let entries: Vec<ListingEntry> = parse_listing(&html, &url)
                .into_iter()
                .filter(|e| seen_details.insert(e.detail_url.clone()))
                .collect();
            if entries.is_empty() {
                info!("CSB page {} repeated earlier results; stopping", page);
                break;
            }

            for entry in &entries {
                if records.len() >= limit {
                    break;
                }
                if let Some(record) = self.discover_entry(entry, records.len() + 1).await {
                    info!("Discovered CSB incident: {}", record.incident_id);
                    records.push(record);
                }
            }

            page += 1;
        }

        records
    }
}
