//! Multi-progress display for concurrent downloads.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

fn idle_style() -> ProgressStyle {
    style("  {spinner:.dim} {wide_msg}", ProgressStyle::default_spinner)
}

/// One progress bar per download worker, plus a summary bar.
pub struct DownloadProgress {
    multi: MultiProgress,
    slots: Mutex<Vec<ProgressBar>>,
    summary_bar: ProgressBar,
}

impl DownloadProgress {
    pub fn new(num_workers: usize, total: u64) -> Self {
        let multi = MultiProgress::new();

        let summary_bar = multi.add(ProgressBar::new(total));
        summary_bar.set_style(
            style(
                "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}",
                ProgressStyle::default_bar,
            )
            .progress_chars("█▓░"),
        );
        summary_bar.set_message("Downloading");

        let slots = (0..num_workers)
            .map(|_| {
                let bar = multi.add(ProgressBar::new(0));
                bar.set_style(idle_style());
                bar.set_message("idle");
                bar
            })
            .collect();

        Self {
            multi,
            slots: Mutex::new(slots),
            summary_bar,
        }
    }

    /// Show an incident on the worker's bar.
    pub async fn start_download(&self, worker_id: usize, incident_id: &str) {
        let slots = self.slots.lock().await;
        let Some(bar) = slots.get(worker_id) else {
            return;
        };
        bar.set_style(style("  {spinner:.cyan} {wide_msg}", ProgressStyle::default_spinner));
        bar.set_length(0);
        bar.set_position(0);
        bar.set_message(truncate_label(incident_id, 35));
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
    }

    /// Update byte progress, switching to a bar once the size is known.
    pub async fn update_progress(&self, worker_id: usize, bytes: u64, total: Option<u64>) {
        let slots = self.slots.lock().await;
        let Some(bar) = slots.get(worker_id) else {
            return;
        };
        if let Some(total) = total {
            if bar.length() != Some(total) {
                bar.set_style(
                    style(
                        "  {spinner:.cyan} {wide_msg} [{bar:25.cyan/blue}] {bytes}/{total_bytes}",
                        ProgressStyle::default_bar,
                    )
                    .progress_chars("━╸─"),
                );
                bar.set_length(total);
            }
        }
        bar.set_position(bytes);
    }

    /// Return the worker's bar to idle and advance the summary.
    pub async fn finish_download(&self, worker_id: usize) {
        let slots = self.slots.lock().await;
        if let Some(bar) = slots.get(worker_id) {
            bar.disable_steady_tick();
            bar.set_style(idle_style());
            bar.set_message("idle");
            bar.set_length(0);
            bar.set_position(0);
        }
        self.summary_bar.inc(1);
    }

    pub fn set_summary(&self, downloaded: usize, failed: usize) {
        self.summary_bar
            .set_message(format!("Downloaded: {} | Failed: {}", downloaded, failed));
    }

    /// Print without corrupting the bars.
    pub fn println(&self, message: &str) {
        let _ = self.multi.println(message);
    }

    pub async fn finish(&self) {
        let slots = self.slots.lock().await;
        for bar in slots.iter() {
            bar.finish_and_clear();
        }
        self.summary_bar.finish_and_clear();
    }
}

fn truncate_label(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        label.to_string()
    } else {
        let head: String = label.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short", 35), "short");
        let long = "a".repeat(40);
        let truncated = truncate_label(&long, 10);
        assert_eq!(truncated, "aaaaaaa...");
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let progress = DownloadProgress::new(2, 3);
        progress.start_download(0, "incident-1").await;
        progress.update_progress(0, 10, Some(100)).await;
        progress.finish_download(0).await;
        progress.start_download(5, "out of range").await;
        assert_eq!(progress.summary_bar.position(), 1);
        progress.finish().await;
    }
}
