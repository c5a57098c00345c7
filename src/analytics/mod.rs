//! Bowtie barrier-coverage analytics.

mod bowtie;
mod fleet;

pub use bowtie::{
    calculate_barrier_coverage, identify_gaps, load_bowtie, Barrier, BarrierCoverage, BarrierSide,
    Bowtie, BowtieError, Gap,
};
pub use fleet::{calculate_fleet_metrics, FleetMetrics, IncidentAnalytics};
