//! Discover incidents and download their reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;
use tokio::sync::mpsc;
use url::Url;

use crate::cli::progress::DownloadProgress;
use crate::config::Settings;
use crate::manifest::{load_records, merge_acquisition, save_records};
use crate::models::AcquisitionRecord;
use crate::scrapers::{BseeProducer, CsbProducer, HttpClient, IncidentProducer};
use crate::services::{DownloadConfig, DownloadEvent, DownloadService};

pub struct AcquireArgs {
    pub csb_limit: usize,
    pub bsee_limit: usize,
    pub out: Option<PathBuf>,
    pub download: bool,
    pub timeout: Option<u64>,
    pub workers: Option<usize>,
    pub append: bool,
    pub progress: bool,
}

fn parse_base_url(name: &str, value: &str) -> anyhow::Result<Url> {
    Url::parse(value).with_context(|| format!("Invalid {} base URL: {}", name, value))
}

/// Discover, optionally download, and write the acquisition manifest.
pub async fn cmd_acquire(settings: &Settings, args: AcquireArgs) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let out = args.out.unwrap_or_else(|| settings.acquisition_manifest());
    let documents_dir = out
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.raw_dir());
    let timeout = Duration::from_secs(args.timeout.unwrap_or(settings.request_timeout));
    let request_delay = Duration::from_millis(settings.request_delay_ms);

    let client = HttpClient::with_user_agent(timeout, request_delay, Some(&settings.user_agent));
    let producers: Vec<(Box<dyn IncidentProducer>, usize)> = vec![
        (
            Box::new(CsbProducer::new(
                client.clone(),
                parse_base_url("CSB", &settings.csb_base_url)?,
            )),
            args.csb_limit,
        ),
        (
            Box::new(BseeProducer::new(
                client,
                parse_base_url("BSEE", &settings.bsee_base_url)?,
            )),
            args.bsee_limit,
        ),
    ];

    let mut incoming = Vec::new();
    for (producer, limit) in &producers {
        let found = producer.discover(*limit).await;
        println!(
            "{} {}: discovered {} incidents",
            style("→").cyan(),
            producer.source(),
            found.len()
        );
        incoming.extend(found);
    }

    if args.download && !incoming.is_empty() {
        let workers = args.workers.unwrap_or(settings.download_workers).max(1);
        let config = DownloadConfig::new(documents_dir)
            .with_timeout(timeout)
            .with_request_delay(request_delay)
            .with_user_agent(Some(settings.user_agent.clone()));
        incoming = download_records(config, incoming, workers, args.progress).await;
    }

    let records = if args.append && out.exists() {
        let existing: Vec<AcquisitionRecord> = load_records(&out)?;
        let outcome = merge_acquisition(&existing, &incoming);
        println!(
            "{} Merged into {} existing records: {} new, {} replaced, {} kept",
            style("→").cyan(),
            existing.len(),
            outcome.summary.inserted,
            outcome.summary.replaced,
            outcome.summary.kept
        );
        outcome.records
    } else {
        incoming
    };

    save_records(&out, &records)?;

    let downloaded = records.iter().filter(|r| r.downloaded).count();
    let failed = records.iter().filter(|r| r.error.is_some()).count();
    println!(
        "{} Wrote {} records to {}",
        style("✓").green(),
        records.len(),
        out.display()
    );
    println!("  {} {} downloaded", style("→").dim(), downloaded);
    if failed > 0 {
        println!("  {} {} with errors", style("!").yellow(), failed);
    }

    Ok(())
}

/// Run the download pool, reporting events to the console.
async fn download_records(
    config: DownloadConfig,
    records: Vec<AcquisitionRecord>,
    workers: usize,
    show_progress: bool,
) -> Vec<AcquisitionRecord> {
    println!(
        "{} Starting {} download workers ({} incidents)",
        style("→").cyan(),
        workers,
        records.len()
    );

    let service = DownloadService::new(config);
    let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);

    let progress_display = if show_progress {
        Some(Arc::new(DownloadProgress::new(workers, records.len() as u64)))
    } else {
        None
    };

    let progress_clone = progress_display.clone();
    let event_handler = tokio::spawn(async move {
        let mut downloaded = 0usize;
        let mut failed = 0usize;

        while let Some(event) = event_rx.recv().await {
            match event {
                DownloadEvent::Started {
                    worker_id,
                    incident_id,
                    ..
                } => {
                    if let Some(ref progress) = progress_clone {
                        progress.start_download(worker_id, &incident_id).await;
                    }
                }
                DownloadEvent::Progress {
                    worker_id,
                    bytes,
                    total,
                } => {
                    if let Some(ref progress) = progress_clone {
                        progress.update_progress(worker_id, bytes, total).await;
                    }
                }
                DownloadEvent::Completed { worker_id, .. } => {
                    downloaded += 1;
                    if let Some(ref progress) = progress_clone {
                        progress.set_summary(downloaded, failed);
                        progress.finish_download(worker_id).await;
                    }
                }
                DownloadEvent::Failed {
                    worker_id,
                    incident_id,
                    error,
                } => {
                    failed += 1;
                    let message = format!(
                        "{} Failed to download {}: {}",
                        style("✗").red(),
                        incident_id,
                        error
                    );
                    if let Some(ref progress) = progress_clone {
                        progress.println(&message);
                        progress.set_summary(downloaded, failed);
                        progress.finish_download(worker_id).await;
                    } else {
                        eprintln!("{}", message);
                    }
                }
            }
        }
    });

    let result = service.download_all(records, workers, Some(event_tx)).await;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }

    if let Some(ref progress) = progress_display {
        progress.finish().await;
    }

    println!(
        "{} Downloaded {} reports ({} failed)",
        style("✓").green(),
        result.downloaded,
        result.failed
    );

    result.records
}
