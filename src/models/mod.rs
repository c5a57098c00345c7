//! Data models for the incident acquisition pipeline.

mod incident;
mod manifest;

pub use incident::{Incident, IncidentParseError};
pub use manifest::{
    derive_text_path, timestamp_now, AcquisitionRecord, ExtractionRecord, IncidentSource,
    StructuredRecord,
};
