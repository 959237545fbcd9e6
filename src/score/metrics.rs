use std::fmt;

use tracing::warn;

use crate::{geom::overlay::AreaRecord, types::UnitId};

/// Per-unit derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub unit_id: UnitId,
    /// Population with missing values defaulted to 0 and negatives clamped.
    pub population: u64,
    pub blockgroup_area: f64,
    pub green_area: f64,
    /// Fraction of the unit covered by green space, in [0, 1] for well-formed inputs.
    pub green_percentage: f64,
    /// Green area in m² per resident; exactly 0.0 for units without residents.
    pub green_area_per_person: f64,
}

/// The sub-metrics that feed the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    GreenPercentage,
    GreenAreaPerPerson,
}

impl Metric {
    /// Read this metric from a record.
    pub fn value(&self, record: &MetricRecord) -> f64 {
        match self {
            Metric::GreenPercentage => record.green_percentage,
            Metric::GreenAreaPerPerson => record.green_area_per_person,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::GreenPercentage => write!(f, "green_percentage"),
            Metric::GreenAreaPerPerson => write!(f, "green_area_per_person"),
        }
    }
}

/// `green_area / blockgroup_area`, or 0.0 when undefined.
pub fn green_percentage(green_area: f64, blockgroup_area: f64) -> f64 {
    if blockgroup_area == 0.0 { return 0.0 }
    let ratio = green_area / blockgroup_area;
    if ratio.is_finite() { ratio } else { 0.0 }
}

/// Default missing population to 0 and clamp negatives.
pub fn clamp_population(population: Option<i64>) -> u64 {
    population.unwrap_or(0).max(0) as u64
}

/// `green_area / population` for populated units, else exactly 0.0.
pub fn green_area_per_person(green_area: f64, population: u64) -> f64 {
    if population == 0 { return 0.0 }
    let ratio = green_area / population as f64;
    if ratio.is_finite() { ratio } else { 0.0 }
}

/// Derive percentage and per-capita metrics for every unit.
pub fn derive(records: &[AreaRecord]) -> Vec<MetricRecord> {
    records.iter()
        .map(|record| {
            let population = clamp_population(record.population);
            let metrics = MetricRecord {
                unit_id: record.unit_id.clone(),
                population,
                blockgroup_area: record.blockgroup_area,
                green_area: record.green_area,
                green_percentage: green_percentage(record.green_area, record.blockgroup_area),
                green_area_per_person: green_area_per_person(record.green_area, population),
            };
            if metrics.green_percentage > 1.0 + 1e-9 {
                warn!(
                    unit_id = %metrics.unit_id,
                    green_percentage = metrics.green_percentage,
                    "green area exceeds unit area; green-space input likely has overlapping features"
                );
            }
            metrics
        })
        .collect()
}
