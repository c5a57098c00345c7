//! US Bureau of Safety and Environmental Enforcement district report discovery.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use url::Url;

use super::{collect_links, extract_filename_from_url, is_pdf_link, slugify, HttpClient, IncidentProducer};
use crate::models::{AcquisitionRecord, IncidentSource};

pub const BSEE_BASE_URL: &str = "https://www.bsee.gov";
const DISTRICT_PATH: &str = "/what-we-do/incident-investigations/offshore-incident-investigations/district-investigation-reports";

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").unwrap());

/// Incident id from a report URL's filename stem.
///
/// Falls back to a short URL digest when the stem slugifies to nothing.
pub fn incident_id_from_pdf(pdf_url: &str) -> String {
    let filename = extract_filename_from_url(pdf_url);
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => filename.as_str(),
    };
    let slug = slugify(stem);
    if !slug.is_empty() {
        return slug;
    }
    let digest = hex::encode(Sha256::digest(pdf_url.as_bytes()));
    format!("bsee-{}", &digest[..8])
}

/// Year-of-incident guess from the first four-digit run in the URL.
pub fn year_from_url(pdf_url: &str) -> Option<String> {
    YEAR.captures(pdf_url)
        .map(|caps| format!("{}-01-01", &caps[1]))
}

/// Discovered records for every distinct PDF linked from the reports page.
pub fn parse_reports_page(html: &str, page_url: &Url, limit: usize) -> Vec<AcquisitionRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for link in collect_links(html, page_url) {
        if records.len() >= limit {
            break;
        }
        if !is_pdf_link(&link.url) {
            continue;
        }
        let pdf_url = link.url.to_string();
        if !seen.insert(pdf_url.clone()) {
            continue;
        }

        let incident_id = incident_id_from_pdf(&pdf_url);
        let title = if link.text.is_empty() {
            incident_id.clone()
        } else {
            link.text.clone()
        };
        let filename = extract_filename_from_url(&pdf_url);
        let date_occurred = year_from_url(&pdf_url);

        records.push(
            AcquisitionRecord::discovered(
                IncidentSource::Bsee,
                incident_id,
                title,
                page_url.to_string(),
                pdf_url,
                AcquisitionRecord::pdf_path_for(IncidentSource::Bsee, &filename),
            )
            .with_date_occurred(date_occurred),
        );
    }

    records
}

/// Discovery producer for BSEE district investigation reports.
pub struct BseeProducer {
    client: HttpClient,
    base_url: Url,
}

impl BseeProducer {
    pub fn new(client: HttpClient, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl IncidentProducer for BseeProducer {
    fn source(&self) -> IncidentSource {
        IncidentSource::Bsee
    }

    async fn discover(&self, limit: usize) -> Vec<AcquisitionRecord> {
        let page_url = match self.base_url.join(DISTRICT_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid BSEE base URL {}: {}", self.base_url, e);
                return Vec::new();
            }
        };
        info!("Fetching BSEE district reports: {}", page_url);

        let html = match self.client.get(page_url.as_str()).await {
            Ok(response) if response.is_ok() => match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to read BSEE district page: {}", e);
                    return Vec::new();
                }
            },
            Ok(response) => {
                warn!("BSEE district page returned {}", response.status);
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to fetch BSEE district page: {}", e);
                return Vec::new();
            }
        };

        let records = parse_reports_page(&html, &page_url, limit);
        for record in &records {
            info!("Discovered BSEE incident: {}", record.incident_id);
        }
        records
    }
}
