use ahash::AHashMap;
use geo::{Geometry, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    ScoreError,
    geom::{Crs, Reprojector, overlay, reproject_features, sanitize, total_bounds},
    score::{metrics, normalize},
    types::{AdminUnit, Feature, GreenSpace, Layer, Properties, UnitId, ensure_unique},
};

/// Projected CRS used for area math when inputs arrive in lon/lat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectedCrs {
    /// EPSG:3857.
    #[default]
    WebMercator,
    /// WGS84 UTM zone containing the center of the unit layer.
    Utm,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringOptions {
    pub projection: ProjectedCrs,
    /// Union overlapping green polygons before the overlay.
    pub dissolve_green: bool,
}

/// One row of the scored output table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUnit {
    pub unit_id: UnitId,
    pub name: Option<String>,
    pub population: u64,
    pub blockgroup_area: f64,
    pub green_area: f64,
    pub green_percentage: f64,
    pub green_area_per_person: f64,
    pub green_score: f64,
    /// Sanitized unit geometry in the input CRS.
    pub geometry: MultiPolygon<f64>,
}

impl ScoredUnit {
    /// Output fields as a property bag, in output column order.
    pub fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert("unit_id".to_string(), json!(self.unit_id.as_str()));
        if let Some(name) = &self.name {
            properties.insert("name".to_string(), json!(name));
        }
        properties.insert("population".to_string(), json!(self.population));
        properties.insert("blockgroup_area".to_string(), json!(self.blockgroup_area));
        properties.insert("green_area".to_string(), json!(self.green_area));
        properties.insert("green_percentage".to_string(), json!(self.green_percentage));
        properties.insert("green_area_per_person".to_string(), json!(self.green_area_per_person));
        properties.insert("green_score".to_string(), json!(self.green_score));
        properties
    }

    /// Output row as a generic feature, for writers and the renderer.
    pub fn to_feature(&self) -> Feature<Properties> {
        Feature::new(Some(Geometry::MultiPolygon(self.geometry.clone())), self.properties())
    }
}

/// Builder that refuses to run until both inputs are supplied.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    units: Option<Layer<AdminUnit>>,
    green: Option<Layer<Feature<GreenSpace>>>,
    options: ScoringOptions,
}

impl ScoringEngine {
    pub fn new(options: ScoringOptions) -> Self {
        Self { options, ..Default::default() }
    }

    pub fn units(mut self, units: Layer<AdminUnit>) -> Self {
        self.units = Some(units);
        self
    }

    pub fn green_space(mut self, green: Layer<Feature<GreenSpace>>) -> Self {
        self.green = Some(green);
        self
    }

    pub fn run(&self) -> Result<Layer<ScoredUnit>, ScoreError> {
        let units = self.units.as_ref().ok_or(ScoreError::MissingInput("administrative units"))?;
        let green = self.green.as_ref().ok_or(ScoreError::MissingInput("green space"))?;
        score_units(units, green, &self.options)
    }
}

/// Score every unit by green-space access.
///
/// Each stage takes the previous stage's records by reference and returns new
/// ones: reproject → sanitize → overlay → derive metrics → normalize. The
/// output has one row per input unit, in input order, in the input CRS.
/// Scores are relative to this unit set.
pub fn score_units(
    units: &Layer<AdminUnit>,
    green: &Layer<Feature<GreenSpace>>,
    options: &ScoringOptions,
) -> Result<Layer<ScoredUnit>, ScoreError> {
    ensure_unique(&units.items)?;
    if units.crs != green.crs {
        return Err(ScoreError::CrsMismatch { units: units.crs, green: green.crs });
    }

    let metric_crs = match (units.crs, options.projection) {
        (Crs::Geographic, ProjectedCrs::WebMercator) => Crs::WebMercator,
        (Crs::Geographic, ProjectedCrs::Utm) =>
            Crs::utm_for(total_bounds(units.items.iter().filter_map(|unit| unit.geometry.as_ref()))),
        (projected, _) => projected,
    };
    info!(units = units.len(), green = green.len(), crs = %metric_crs, "scoring units");

    let unit_features = units.items.iter()
        .map(|unit| Feature::new(unit.geometry.clone(), unit.unit_id.clone()))
        .collect::<Vec<_>>();
    let unit_parts = sanitize(&reproject_features(&unit_features, units.crs, metric_crs)?);
    let green_parts = sanitize(&reproject_features(&green.items, green.crs, metric_crs)?);
    info!(unit_parts = unit_parts.len(), green_parts = green_parts.len(), "sanitized inputs");

    let areas = if options.dissolve_green {
        overlay::aggregate(&units.items, &unit_parts, &overlay::dissolve(&green_parts))
    } else {
        overlay::aggregate(&units.items, &unit_parts, &green_parts)
    };
    let scored = normalize::normalize(&metrics::derive(&areas));

    let to_input = Reprojector::new(metric_crs, units.crs)?;
    let mut parts_by_unit = unit_parts.into_iter()
        .fold(AHashMap::<UnitId, Vec<Polygon<f64>>>::new(), |mut acc, part| {
            acc.entry(part.attrs).or_default().push(part.polygon);
            acc
        });

    let items = units.items.iter().zip(scored)
        .map(|(unit, record)| {
            let parts = parts_by_unit.remove(&unit.unit_id).unwrap_or_default();
            let metrics = record.metrics;
            Ok(ScoredUnit {
                unit_id: metrics.unit_id,
                name: unit.name.clone(),
                population: metrics.population,
                blockgroup_area: metrics.blockgroup_area,
                green_area: metrics.green_area,
                green_percentage: metrics.green_percentage,
                green_area_per_person: metrics.green_area_per_person,
                green_score: record.green_score,
                geometry: to_input.geometry(&MultiPolygon::new(parts))?,
            })
        })
        .collect::<Result<Vec<_>, ScoreError>>()?;

    info!(units = items.len(), "scored units");
    Ok(Layer::new(units.crs, items))
}
