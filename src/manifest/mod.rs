//! Manifest reconciliation: merge policy and CSV persistence.

mod codec;
mod merge;

pub use codec::{load_records, save_records, ManifestError, ManifestRecord};
pub use merge::{
    enrich, merge_acquisition, merge_extraction, merge_structured, resolve_conflict,
    Discriminator, MergeKey, MergeOutcome, MergeSummary, Resolution,
};
