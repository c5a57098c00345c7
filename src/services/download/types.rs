//! Download service types and events.

use std::path::PathBuf;
use std::time::Duration;

use crate::models::AcquisitionRecord;

/// Events emitted during download operations.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Download started for an incident
    Started {
        worker_id: usize,
        incident_id: String,
        url: String,
    },
    /// Progress update (bytes downloaded so far)
    Progress {
        worker_id: usize,
        bytes: u64,
        total: Option<u64>,
    },
    /// Download completed successfully
    Completed {
        worker_id: usize,
        incident_id: String,
        bytes: u64,
    },
    /// Download failed
    Failed {
        worker_id: usize,
        incident_id: String,
        error: String,
    },
}

/// Result of a batch download.
#[derive(Debug)]
pub struct DownloadResult {
    /// Updated records, in input order.
    pub records: Vec<AcquisitionRecord>,
    pub downloaded: usize,
    pub failed: usize,
}

/// Configuration for download service.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Root that record `pdf_path`s are relative to.
    pub documents_dir: PathBuf,
    pub request_timeout: Duration,
    pub request_delay: Duration,
    pub user_agent: Option<String>,
}

impl DownloadConfig {
    pub fn new(documents_dir: PathBuf) -> Self {
        Self {
            documents_dir,
            request_timeout: Duration::from_secs(30),
            request_delay: Duration::ZERO,
            user_agent: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}
