//! Aggregate metrics across processed incidents.

use serde::{Deserialize, Serialize};

use super::{BarrierCoverage, Gap};

/// Analytics attached to one processed incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentAnalytics {
    pub coverage: BarrierCoverage,
    pub gaps: Vec<Gap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FleetMetrics {
    pub total_incidents: usize,
    pub average_prevention_coverage: f64,
    pub average_mitigation_coverage: f64,
    pub average_overall_coverage: f64,
}

/// Fleet metrics over every processed incident.
///
/// `total_incidents` counts all incidents; averages only cover those with
/// analytics.
pub fn calculate_fleet_metrics(incidents: &[Option<&IncidentAnalytics>]) -> FleetMetrics {
    let analysed: Vec<&BarrierCoverage> = incidents
        .iter()
        .flatten()
        .map(|analytics| &analytics.coverage)
        .collect();

    let average = |f: fn(&BarrierCoverage) -> f64| {
        if analysed.is_empty() {
            0.0
        } else {
            analysed.iter().map(|c| f(c)).sum::<f64>() / analysed.len() as f64
        }
    };

    FleetMetrics {
        total_incidents: incidents.len(),
        average_prevention_coverage: average(|c| c.prevention_coverage),
        average_mitigation_coverage: average(|c| c.mitigation_coverage),
        average_overall_coverage: average(|c| c.overall_coverage),
    }
}
