//! Min-max normalization and the composite green score.
//!
//! The score is relative: units are ranked against the other units of the
//! same run. The same areas and population in a different unit set (with a
//! different minimum and maximum) yield a different score.

use crate::score::metrics::{Metric, MetricRecord};

/// Weighted sub-metrics of the composite score.
pub const WEIGHTS: [(Metric, f64); 2] = [
    (Metric::GreenPercentage, 0.5),
    (Metric::GreenAreaPerPerson, 0.5),
];

pub const SCORE_MIN: f64 = 1.0;
pub const SCORE_MAX: f64 = 100.0;

/// Metrics plus their normalized values and the final score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub metrics: MetricRecord,
    pub percentage_norm: f64,
    pub per_person_norm: f64,
    pub green_score: f64,
}

/// Linear rescale of `values` onto [0, 1] using their own min and max.
/// Non-finite values count as 0.0. When all values are equal (including a
/// single value) every output is 0.0.
pub fn min_max(values: &[f64]) -> Vec<f64> {
    let values = values.iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect::<Vec<_>>();

    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if hi > lo {
        values.iter().map(|v| (v - lo) / (hi - lo)).collect()
    } else {
        vec![0.0; values.len()]
    }
}

/// Map weighted normalized metrics onto [1, 100], rounded to one decimal.
pub fn composite(percentage_norm: f64, per_person_norm: f64) -> f64 {
    let [(_, w_pct), (_, w_pp)] = WEIGHTS;
    let combined = w_pct * percentage_norm + w_pp * per_person_norm;
    let score = combined * (SCORE_MAX - SCORE_MIN) + SCORE_MIN;
    ((score * 10.0).round() / 10.0).clamp(SCORE_MIN, SCORE_MAX)
}

/// Score every unit. Bounds are computed over the whole set before any
/// score is assigned.
pub fn normalize(records: &[MetricRecord]) -> Vec<ScoredRecord> {
    let [(pct_metric, _), (pp_metric, _)] = WEIGHTS;
    let series = |metric: Metric| records.iter().map(|r| metric.value(r)).collect::<Vec<_>>();

    let percentage_norm = min_max(&series(pct_metric));
    let per_person_norm = min_max(&series(pp_metric));

    records.iter().zip(percentage_norm).zip(per_person_norm)
        .map(|((metrics, percentage_norm), per_person_norm)| ScoredRecord {
            metrics: metrics.clone(),
            percentage_norm,
            per_person_norm,
            green_score: composite(percentage_norm, per_person_norm),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::types::UnitId;

    use super::*;

    fn record(id: &str, green_percentage: f64, green_area_per_person: f64) -> MetricRecord {
        MetricRecord {
            unit_id: UnitId::new(id),
            population: 100,
            blockgroup_area: 10_000.0,
            green_area: green_percentage * 10_000.0,
            green_percentage,
            green_area_per_person,
        }
    }

    #[test]
    fn min_max_rescales() {
        assert_eq!(min_max(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn min_max_degenerate_is_zero() {
        assert_eq!(min_max(&[7.0, 7.0, 7.0]), vec![0.0; 3]);
        assert_eq!(min_max(&[3.5]), vec![0.0]);
        assert!(min_max(&[]).is_empty());
    }

    #[test]
    fn min_max_treats_non_finite_as_zero() {
        assert_eq!(min_max(&[f64::NAN, 2.0, f64::INFINITY]), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn composite_bounds() {
        assert_eq!(composite(0.0, 0.0), 1.0);
        assert_eq!(composite(1.0, 1.0), 100.0);
        assert_eq!(composite(1.0, 0.0), 50.5);
        assert_eq!(composite(0.25, 0.0), 13.4);
    }

    #[test]
    fn identical_metrics_score_one() {
        let records = vec![record("A", 0.3, 12.0), record("B", 0.3, 12.0), record("C", 0.3, 12.0)];
        assert!(normalize(&records).iter().all(|r| r.green_score == 1.0));
    }

    #[test]
    fn two_unit_scenario() {
        let records = vec![record("A", 0.5, 50.0), record("B", 0.0, 0.0)];
        let scored = normalize(&records);
        assert_eq!(scored[0].percentage_norm, 1.0);
        assert_eq!(scored[1].percentage_norm, 0.0);
        assert_eq!(scored[0].green_score, 100.0);
        assert_eq!(scored[1].green_score, 1.0);
    }

    #[test]
    fn scores_are_relative_to_the_unit_set() {
        let alone = normalize(&[record("A", 0.2, 10.0), record("B", 0.0, 0.0)]);
        let crowded = normalize(&[record("A", 0.2, 10.0), record("B", 0.0, 0.0), record("C", 0.8, 40.0)]);
        assert_eq!(alone[0].green_score, 100.0);
        assert!(crowded[0].green_score < alone[0].green_score);
    }

    #[test]
    fn scores_stay_in_range_for_extreme_inputs() {
        let records = vec![record("A", 1e-300, 1e300), record("B", 0.9, 0.0), record("C", 0.0, f64::MAX)];
        for scored in normalize(&records) {
            assert!((SCORE_MIN..=SCORE_MAX).contains(&scored.green_score));
        }
    }
}
