use ahash::AHashSet;
use geo::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{ScoreError, types::{Feature, Properties, UnitId}};

/// Exact field names the engine reads from unit features.
/// No candidate matching: a feature without `id_field` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitSchema {
    pub id_field: String,
    pub population_field: String,
    /// Optional human-readable name carried through to the output.
    pub name_field: Option<String>,
}

impl Default for UnitSchema {
    fn default() -> Self {
        Self {
            id_field: "GEOID".to_string(),
            population_field: "population".to_string(),
            name_field: None,
        }
    }
}

/// An administrative unit (census block group) as supplied to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUnit {
    pub unit_id: UnitId,
    pub name: Option<String>,
    pub population: Option<i64>,
    pub geometry: Option<Geometry<f64>>,
}

impl AdminUnit {
    pub fn new(unit_id: impl Into<UnitId>, population: Option<i64>, geometry: Option<Geometry<f64>>) -> Self {
        Self { unit_id: unit_id.into(), name: None, population, geometry }
    }

    /// Build units from raw features using the exact field names in `schema`.
    /// A missing population field is a data-quality defect and yields `None`;
    /// a missing or duplicate identifier is fatal.
    pub fn from_features(features: Vec<Feature<Properties>>, schema: &UnitSchema) -> Result<Vec<Self>, ScoreError> {
        let units = features.into_iter().enumerate()
            .map(|(index, feature)| {
                let unit_id = read_unit_id(&feature.attrs, &schema.id_field, index)?;
                let population = feature.attrs.get(&schema.population_field)
                    .and_then(|value| read_population(value, unit_id.as_str()));
                let name = schema.name_field.as_ref()
                    .and_then(|field| feature.attrs.get(field))
                    .and_then(|value| value.as_str().map(str::to_string));
                Ok(Self { unit_id, name, population, geometry: feature.geometry })
            })
            .collect::<Result<Vec<_>, ScoreError>>()?;

        ensure_unique(&units)?;
        Ok(units)
    }
}

/// Fail on the first repeated `unit_id`.
pub(crate) fn ensure_unique(units: &[AdminUnit]) -> Result<(), ScoreError> {
    let mut seen = AHashSet::with_capacity(units.len());
    for unit in units {
        if !seen.insert(&unit.unit_id) {
            return Err(ScoreError::DuplicateUnitId(unit.unit_id.to_string()));
        }
    }
    Ok(())
}

/// Identifiers must be non-empty strings; integer identifiers are accepted
/// verbatim (leading zeros are already lost at that point).
fn read_unit_id(attrs: &Properties, field: &str, index: usize) -> Result<UnitId, ScoreError> {
    match attrs.get(field) {
        None | Some(Value::Null) => Err(ScoreError::MissingField { index, field: field.to_string() }),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(UnitId::new(s.trim())),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(UnitId::from(n.to_string())),
        Some(other) => Err(ScoreError::InvalidField {
            index,
            field: field.to_string(),
            reason: format!("expected a non-empty string identifier, got {other}"),
        }),
    }
}

/// Coerce a population value; anything unparseable becomes `None`.
pub(crate) fn read_population(value: &Value, unit_id: &str) -> Option<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok()
                .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i64))
        }
        _ => None,
    };
    if parsed.is_none() && !value.is_null() {
        debug!(unit_id, %value, "unparseable population treated as missing");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn reads_exact_fields() {
        let features = vec![
            Feature::new(None, props(json!({"GEOID": "060730001001", "population": 1200}))),
            Feature::new(None, props(json!({"GEOID": "060730001002", "population": "35"}))),
            Feature::new(None, props(json!({"GEOID": "060730001003"}))),
        ];
        let units = AdminUnit::from_features(features, &UnitSchema::default()).unwrap();
        assert_eq!(units[0].population, Some(1200));
        assert_eq!(units[1].population, Some(35));
        assert_eq!(units[2].population, None);
    }

    #[test]
    fn missing_identifier_is_fatal() {
        let features = vec![Feature::new(None, props(json!({"geoid": "1"})))];
        let err = AdminUnit::from_features(features, &UnitSchema::default()).unwrap_err();
        assert!(matches!(err, ScoreError::MissingField { index: 0, .. }));
    }

    #[test]
    fn duplicate_identifier_is_fatal() {
        let features = vec![
            Feature::new(None, props(json!({"GEOID": "A"}))),
            Feature::new(None, props(json!({"GEOID": "A"}))),
        ];
        let err = AdminUnit::from_features(features, &UnitSchema::default()).unwrap_err();
        assert!(matches!(err, ScoreError::DuplicateUnitId(id) if id == "A"));
    }

    #[test]
    fn unparseable_population_is_missing() {
        assert_eq!(read_population(&json!("N/A"), "A"), None);
        assert_eq!(read_population(&json!(12.6), "A"), Some(13));
        assert_eq!(read_population(&Value::Null, "A"), None);
    }
}
