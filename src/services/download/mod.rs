//! Incident report download service.
//!
//! Fetches report PDFs for discovered records, streaming each body to disk
//! while hashing it. Separated from UI concerns - emits events for progress
//! tracking.

mod types;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::models::{timestamp_now, AcquisitionRecord};
use crate::scrapers::HttpClient;

pub use types::{DownloadConfig, DownloadEvent, DownloadResult};

/// Whether a response looks like a PDF by content type or URL.
pub fn is_pdf_response(content_type: &str, url: &str) -> bool {
    content_type.to_lowercase().contains("pdf") || url.to_lowercase().ends_with(".pdf")
}

/// A body successfully streamed to disk.
struct StoredBody {
    size: u64,
    sha256: String,
}

/// Why streaming a body to disk failed.
enum StreamFailure {
    Io(std::io::Error),
    Http(reqwest::Error),
}

impl std::fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamFailure::Io(e) => write!(f, "{}", e),
            StreamFailure::Http(e) => write!(f, "{}", e),
        }
    }
}

/// Per-index results, stored as each record finishes.
///
/// A crashed worker only loses the record it was fetching; everything it
/// finished before is already stored.
#[derive(Clone)]
struct ResultSlots(Arc<Mutex<Vec<Option<AcquisitionRecord>>>>);

impl ResultSlots {
    fn new(len: usize) -> Self {
        Self(Arc::new(Mutex::new(vec![None; len])))
    }

    fn store(&self, index: usize, record: AcquisitionRecord) {
        let mut slots = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(record);
        }
    }

    /// Stored results in index order, falling back to `originals`.
    fn into_records(self, originals: Vec<AcquisitionRecord>) -> Vec<AcquisitionRecord> {
        let mut slots = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *slots)
            .into_iter()
            .zip(originals)
            .map(|(updated, original)| updated.unwrap_or(original))
            .collect()
    }
}

/// Service for downloading incident report PDFs.
#[derive(Clone)]
pub struct DownloadService {
    client: HttpClient,
    documents_dir: PathBuf,
}

impl DownloadService {
    /// Create a new download service.
    pub fn new(config: DownloadConfig) -> Self {
        let client = HttpClient::with_user_agent(
            config.request_timeout,
            config.request_delay,
            config.user_agent.as_deref(),
        );
        Self {
            client,
            documents_dir: config.documents_dir,
        }
    }

    /// Root directory PDFs are written under.
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Download one record's PDF.
    ///
    /// Never fails: every outcome is recorded on the returned copy of
    /// `record`. `retrieved_at` is always set.
    pub async fn download_one(&self, record: &AcquisitionRecord) -> AcquisitionRecord {
        self.fetch(record, None).await
    }

    async fn fetch(
        &self,
        record: &AcquisitionRecord,
        events: Option<(usize, &mpsc::Sender<DownloadEvent>)>,
    ) -> AcquisitionRecord {
        let retrieved_at = timestamp_now();

        if record.pdf_url.is_empty() {
            return record.with_failure(retrieved_at, None, None, Some("No PDF URL".to_string()));
        }

        let mut response = match self.client.get(&record.pdf_url).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to download {}: {}", record.incident_id, e);
                return record.with_failure(retrieved_at, None, None, Some(e.to_string()));
            }
        };

        let status = response.status.as_u16();
        let content_type = response.content_type().map(|s| s.to_string());

        if !response.is_ok() {
            debug!("{} returned HTTP {}", record.pdf_url, status);
            return record.with_failure(
                retrieved_at,
                Some(status),
                content_type,
                Some(format!("HTTP {}", status)),
            );
        }

        let ct_lower = content_type.as_deref().unwrap_or("").to_lowercase();
        if !is_pdf_response(&ct_lower, &record.pdf_url) {
            return record.with_failure(
                retrieved_at,
                Some(status),
                content_type,
                Some(format!("Not a PDF: {}", ct_lower)),
            );
        }

        let dest = self.documents_dir.join(&record.pdf_path);
        let total = response.content_length();
        match stream_to_file(&mut response, &dest, total, events).await {
            Ok(stored) => record.with_download(
                retrieved_at,
                status,
                content_type,
                stored.size,
                stored.sha256,
            ),
            Err(e) => {
                warn!("Failed to store {}: {}", record.incident_id, e);
                let _ = tokio::fs::remove_file(&dest).await;
                record.with_failure(retrieved_at, Some(status), content_type, Some(e.to_string()))
            }
        }
    }

    /// Download every record on a bounded pool of workers.
    ///
    /// Workers claim records from a shared queue; results are collected and
    /// returned together, in input order, once all workers finish.
    pub async fn download_all(
        &self,
        records: Vec<AcquisitionRecord>,
        workers: usize,
        event_tx: Option<mpsc::Sender<DownloadEvent>>,
    ) -> DownloadResult {
        let total = records.len();
        let workers = workers.max(1).min(total.max(1));

        let queue: Arc<Mutex<VecDeque<(usize, AcquisitionRecord)>>> =
            Arc::new(Mutex::new(records.iter().cloned().enumerate().collect()));
        let slots = ResultSlots::new(total);
        let downloaded = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let service = self.clone();
            let queue = queue.clone();
            let slots = slots.clone();
            let downloaded = downloaded.clone();
            let failed = failed.clone();
            let event_tx = event_tx.clone();

            let handle = tokio::spawn(async move {
                loop {
                    // Claim the next record
                    let next = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => None,
                    };
                    let Some((index, record)) = next else {
                        break;
                    };

                    if let Some(tx) = &event_tx {
                        let _ = tx
                            .send(DownloadEvent::Started {
                                worker_id,
                                incident_id: record.incident_id.clone(),
                                url: record.pdf_url.clone(),
                            })
                            .await;
                    }

                    let updated = service
                        .fetch(&record, event_tx.as_ref().map(|tx| (worker_id, tx)))
                        .await;

                    if updated.downloaded {
                        downloaded.fetch_add(1, Ordering::Relaxed);
                        if let Some(tx) = &event_tx {
                            let _ = tx
                                .send(DownloadEvent::Completed {
                                    worker_id,
                                    incident_id: updated.incident_id.clone(),
                                    bytes: updated.file_size_bytes.unwrap_or(0),
                                })
                                .await;
                        }
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                        if let Some(tx) = &event_tx {
                            let _ = tx
                                .send(DownloadEvent::Failed {
                                    worker_id,
                                    incident_id: updated.incident_id.clone(),
                                    error: updated.error.clone().unwrap_or_default(),
                                })
                                .await;
                        }
                    }

                    slots.store(index, updated);
                }
            });

            handles.push(handle);
        }

        // Wait for all workers
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Download worker failed: {}", e);
            }
        }

        let records = slots.into_records(records);

        let result = DownloadResult {
            records,
            downloaded: downloaded.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
        };
        info!(
            "Downloads finished: {} downloaded, {} failed",
            result.downloaded, result.failed
        );
        result
    }
}

/// Stream a response body to `dest`, hashing as it goes.
async fn stream_to_file(
    response: &mut crate::scrapers::HttpResponse,
    dest: &Path,
    total: Option<u64>,
    events: Option<(usize, &mpsc::Sender<DownloadEvent>)>,
) -> Result<StoredBody, StreamFailure> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(StreamFailure::Io)?;
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(StreamFailure::Io)?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    while let Some(chunk) = response.chunk().await.map_err(StreamFailure::Http)? {
        file.write_all(&chunk).await.map_err(StreamFailure::Io)?;
        hasher.update(&chunk);
        size += chunk.len() as u64;

        if let Some((worker_id, tx)) = events {
            let _ = tx
                .send(DownloadEvent::Progress {
                    worker_id,
                    bytes: size,
                    total,
                })
                .await;
        }
    }

    file.flush().await.map_err(StreamFailure::Io)?;

    Ok(StoredBody {
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}
