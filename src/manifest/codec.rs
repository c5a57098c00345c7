//! CSV persistence for manifest record sets.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{AcquisitionRecord, ExtractionRecord, StructuredRecord};

/// Errors reading or writing a manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}:{line}: invalid value in column '{column}': {message}")]
    Parse {
        path: PathBuf,
        line: u64,
        column: String,
        message: String,
    },
}

/// A record type persisted as one manifest row.
pub trait ManifestRecord: Serialize + DeserializeOwned {
    /// Header row, in serialization order.
    const COLUMNS: &'static [&'static str];
}

impl ManifestRecord for AcquisitionRecord {
    const COLUMNS: &'static [&'static str] = AcquisitionRecord::COLUMNS;
}

impl ManifestRecord for ExtractionRecord {
    const COLUMNS: &'static [&'static str] = ExtractionRecord::COLUMNS;
}

impl ManifestRecord for StructuredRecord {
    const COLUMNS: &'static [&'static str] = StructuredRecord::COLUMNS;
}

fn csv_error(path: &Path, headers: Option<&csv::StringRecord>, error: csv::Error) -> ManifestError {
    if let csv::ErrorKind::Deserialize { pos, err } = error.kind() {
        let column = err
            .field()
            .and_then(|idx| headers.and_then(|h| h.get(idx as usize)))
            .unwrap_or("?")
            .to_string();
        return ManifestError::Parse {
            path: path.to_path_buf(),
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            column,
            message: err.to_string(),
        };
    }
    ManifestError::Csv {
        path: path.to_path_buf(),
        source: error,
    }
}

/// Load every row of a manifest.
///
/// A missing file is not an error: it yields no records and a warning.
/// Columns the record type does not know are ignored; absent optional
/// columns take their defaults.
pub fn load_records<T: ManifestRecord>(path: &Path) -> Result<Vec<T>, ManifestError> {
    if !path.exists() {
        warn!("Manifest not found: {}", path.display());
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, None, e))?;

    let headers = reader
        .headers()
        .map_err(|e| csv_error(path, None, e))?
        .clone();

    let mut records = Vec::new();
    for row in reader.deserialize::<T>() {
        records.push(row.map_err(|e| csv_error(path, Some(&headers), e))?);
    }

    debug!("Loaded {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Write a manifest, replacing any existing file.
///
/// The header row is always written, even for an empty record set. Parent
/// directories are created as needed.
pub fn save_records<T: ManifestRecord>(path: &Path, records: &[T]) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ManifestError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| csv_error(path, None, e))?;

    writer
        .write_record(T::COLUMNS)
        .map_err(|e| csv_error(path, None, e))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| csv_error(path, None, e))?;
    }
    writer.flush().map_err(|e| ManifestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}
