use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Feature, Properties};

/// Name fields tried by [`DisplaySchema::from_candidates`], in preference order.
pub const NAME_CANDIDATES: &[&str] = &["NAME", "name", "GEOID", "geoid", "block_group"];

/// Which output fields the map labels and colors by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySchema {
    pub name_field: String,
    pub score_field: String,
}

impl Default for DisplaySchema {
    fn default() -> Self {
        Self { name_field: "unit_id".to_string(), score_field: "green_score".to_string() }
    }
}

impl DisplaySchema {
    /// Pick the first of [`NAME_CANDIDATES`] present on every feature,
    /// falling back to `unit_id`.
    pub fn from_candidates(features: &[Feature<Properties>], score_field: &str) -> Self {
        let name_field = NAME_CANDIDATES.iter()
            .find(|field| !features.is_empty() && features.iter().all(|feature| feature.attrs.contains_key(**field)))
            .map_or("unit_id", |field| *field);
        Self { name_field: name_field.to_string(), score_field: score_field.to_string() }
    }

    /// Both fields must be present on the features being drawn.
    pub fn validate(&self, features: &[Feature<Properties>]) -> Result<()> {
        for field in [&self.score_field, &self.name_field] {
            if let Some(i) = features.iter().position(|feature| !feature.attrs.contains_key(field)) {
                bail!("feature {i} has no display field '{field}'");
            }
        }
        Ok(())
    }

    /// Raw score of each feature; missing or non-numeric values are NaN.
    pub fn scores(&self, features: &[Feature<Properties>]) -> Vec<f64> {
        features.iter()
            .map(|feature| feature.attrs.get(&self.score_field).and_then(Value::as_f64).unwrap_or(f64::NAN))
            .collect()
    }

    /// Label of a feature.
    pub fn label(&self, feature: &Feature<Properties>) -> String {
        match feature.attrs.get(&self.name_field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Map raw scores onto whole numbers in [1, 100] for display.
///
/// A series already in [0, 1] is min-max scaled; anything else is replaced
/// by its percentile rank (ties share their average rank). Non-finite
/// values stay NaN and are excluded from the scaling.
pub fn display_values(scores: &[f64]) -> Vec<f64> {
    let finite = scores.iter().copied().filter(|v| v.is_finite()).collect::<Vec<_>>();
    if finite.is_empty() { return vec![f64::NAN; scores.len()] }

    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let to_display = |t: f64| (t * 99.0 + 1.0).round_ties_even();

    if hi <= 1.0 {
        return scores.iter()
            .map(|&v| if v.is_finite() { to_display((v - lo) / (hi - lo + 1e-9)) } else { f64::NAN })
            .collect();
    }

    let mut sorted = finite;
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    scores.iter()
        .map(|&v| {
            if !v.is_finite() { return f64::NAN }
            // 1-based positions of the tie block [below + 1, below + equal]
            let below = sorted.partition_point(|&x| x < v) as f64;
            let equal = sorted.partition_point(|&x| x <= v) as f64 - below;
            let rank = below + (equal + 1.0) / 2.0;
            to_display(rank / n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn feature(props: Value) -> Feature<Properties> {
        Feature::new(None, props.as_object().cloned().unwrap())
    }

    #[test]
    fn picks_first_available_name_candidate() {
        let features = vec![feature(json!({"GEOID": "1", "name": "Balboa", "green_score": 4.0}))];
        assert_eq!(DisplaySchema::from_candidates(&features, "green_score").name_field, "name");

        let features = vec![feature(json!({"unit_id": "1", "green_score": 4.0}))];
        assert_eq!(DisplaySchema::from_candidates(&features, "green_score").name_field, "unit_id");
    }

    #[test]
    fn validate_requires_both_fields() {
        let features = vec![feature(json!({"unit_id": "1", "green_score": 4.0})), feature(json!({"unit_id": "2"}))];
        assert!(DisplaySchema::default().validate(&features[..1]).is_ok());
        assert!(DisplaySchema::default().validate(&features).is_err());
    }

    #[test]
    fn unit_interval_scores_are_min_max_scaled() {
        assert_eq!(display_values(&[0.0, 0.5, 1.0]), vec![1.0, 50.0, 100.0]);
    }

    #[test]
    fn larger_scores_use_percentile_rank() {
        assert_eq!(display_values(&[10.0, 100.0, 55.0, 1.0]), vec![50.0, 100.0, 75.0, 26.0]);
        // ties share the average rank: (1 + 2) / 2 / 3 = 0.5
        assert_eq!(display_values(&[5.0, 5.0, 9.0]), vec![50.0, 50.0, 100.0]);
    }

    #[test]
    fn non_finite_scores_stay_nan() {
        let out = display_values(&[f64::NAN, 20.0, f64::INFINITY, 40.0]);
        assert!(out[0].is_nan() && out[2].is_nan());
        assert_eq!(out[1], 50.0);
        assert_eq!(out[3], 100.0);
        assert!(display_values(&[f64::NAN]).iter().all(|v| v.is_nan()));
    }
}
