//! Service layer for the incident pipeline stages.
//!
//! Each stage is separated from UI concerns so the CLI only wires
//! configuration, progress reporting and manifests around it.

pub mod download;
pub mod process;
pub mod structured;
pub mod text;

pub use download::{DownloadConfig, DownloadEvent, DownloadResult, DownloadService};
pub use process::{process_raw_files, ProcessReport, ProcessedIncident};
pub use structured::{extract_structured, StructuredOptions, StructuredSummary};
pub use text::{extract_manifest, TextSummary};
