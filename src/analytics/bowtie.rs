//! Reference bowtie and per-incident coverage.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Incident;

#[derive(Debug, Error)]
pub enum BowtieError {
    #[error("Bowtie definition not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bowtie definition {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarrierSide {
    Prevention,
    Mitigation,
}

impl fmt::Display for BarrierSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierSide::Prevention => write!(f, "prevention"),
            BarrierSide::Mitigation => write!(f, "mitigation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrier {
    #[serde(alias = "id")]
    pub barrier_id: String,
    pub name: String,
    #[serde(alias = "type")]
    pub side: BarrierSide,
    #[serde(default)]
    pub description: Option<String>,
}

/// Reference bowtie for one hazard and top event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bowtie {
    pub hazard: String,
    pub top_event: String,
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(default)]
    pub consequences: Vec<String>,
    #[serde(default)]
    pub barriers: Vec<Barrier>,
}

impl Bowtie {
    pub fn barriers_on(&self, side: BarrierSide) -> impl Iterator<Item = &Barrier> {
        self.barriers.iter().filter(move |b| b.side == side)
    }
}

/// Load a reference bowtie from JSON.
pub fn load_bowtie(path: &Path) -> Result<Bowtie, BowtieError> {
    if !path.exists() {
        return Err(BowtieError::NotFound(path.to_path_buf()));
    }
    let body = std::fs::read_to_string(path).map_err(|source| BowtieError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| BowtieError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Fraction of reference barriers present in an incident, per side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BarrierCoverage {
    pub prevention_coverage: f64,
    pub mitigation_coverage: f64,
    pub overall_coverage: f64,
}

/// A reference barrier the incident record does not mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub barrier_id: String,
    pub barrier_name: String,
    pub side: BarrierSide,
    pub reason: String,
}

fn normalize(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Names match when one normalized name contains the other.
fn barrier_present(reference: &Barrier, reported: &[String]) -> bool {
    let wanted = normalize(&reference.name);
    if wanted.is_empty() {
        return false;
    }
    reported.iter().map(|name| normalize(name)).any(|name| {
        !name.is_empty() && (name.contains(&wanted) || wanted.contains(&name))
    })
}

fn reported_on(incident: &Incident, side: BarrierSide) -> &[String] {
    match side {
        BarrierSide::Prevention => &incident.prevention_barriers,
        BarrierSide::Mitigation => &incident.mitigation_barriers,
    }
}

fn ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    }
}

/// Coverage of the reference barriers by an incident's reported barriers.
///
/// A side with no reference barriers has coverage 0.
pub fn calculate_barrier_coverage(incident: &Incident, bowtie: &Bowtie) -> BarrierCoverage {
    let count = |side| {
        let reported = reported_on(incident, side);
        let total = bowtie.barriers_on(side).count();
        let matched = bowtie
            .barriers_on(side)
            .filter(|b| barrier_present(b, reported))
            .count();
        (matched, total)
    };

    let (prev_matched, prev_total) = count(BarrierSide::Prevention);
    let (mit_matched, mit_total) = count(BarrierSide::Mitigation);

    BarrierCoverage {
        prevention_coverage: ratio(prev_matched, prev_total),
        mitigation_coverage: ratio(mit_matched, mit_total),
        overall_coverage: ratio(prev_matched + mit_matched, prev_total + mit_total),
    }
}

/// Reference barriers missing from an incident, in reference order.
pub fn identify_gaps(incident: &Incident, bowtie: &Bowtie) -> Vec<Gap> {
    bowtie
        .barriers
        .iter()
        .filter(|b| !barrier_present(b, reported_on(incident, b.side)))
        .map(|b| Gap {
            barrier_id: b.barrier_id.clone(),
            barrier_name: b.name.clone(),
            side: b.side,
            reason: format!("No {} barrier matching '{}' reported", b.side, b.name),
        })
        .collect()
}
