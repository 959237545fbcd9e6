//! Green-space selection from tagged map features.

use ahash::AHashSet;
use geo::Geometry;
use serde_json::Value;
use tracing::info;

use crate::{io::geojson::geometry_to_json, types::{Feature, GreenSpace, Properties}};

/// Map tags that mark a feature as green space.
pub const GREEN_TAGS: &[(&str, &[&str])] = &[
    ("leisure", &["park", "garden", "recreation_ground", "golf_course", "pitch", "playground", "dog_park"]),
    ("landuse", &["grass", "meadow", "village_green", "forest"]),
    ("natural", &["wood", "scrub", "heath", "grassland", "wetland", "water"]),
    ("boundary", &["protected_area"]),
    ("water", &["lake", "reservoir", "river", "pond", "canal"]),
];

/// `access` values that make a feature non-public.
pub const EXCLUDE_ACCESS: &[&str] = &["private", "no"];

/// Properties that may identify a source feature, in preference order.
pub const ID_CANDIDATES: &[&str] = &[
    "osmid", "osm_id", "@id", "id", "gnis:feature_id", "csp:globalid", "globalid", "global_id",
];

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// First matching tag as `key=value`.
pub fn category(properties: &Properties) -> Option<String> {
    GREEN_TAGS.iter().find_map(|(key, values)| {
        let value = properties.get(*key).and_then(Value::as_str)?;
        values.contains(&value).then(|| format!("{key}={value}"))
    })
}

/// Whether the feature's `access` tag excludes it (case-insensitive).
pub fn is_restricted(properties: &Properties) -> bool {
    properties.get("access")
        .and_then(text)
        .is_some_and(|access| EXCLUDE_ACCESS.contains(&access.trim().to_ascii_lowercase().as_str()))
}

/// First identifier present on the feature.
pub fn source_id(properties: &Properties) -> Option<String> {
    ID_CANDIDATES.iter().find_map(|field| properties.get(*field).and_then(text))
}

/// Duplicate key: every identifier candidate plus the geometry.
fn dedup_key(feature: &Feature<Properties>) -> String {
    let ids = ID_CANDIDATES.iter()
        .map(|field| feature.attrs.get(*field).cloned().unwrap_or(Value::Null))
        .collect::<Vec<_>>();
    let geometry = feature.geometry.as_ref().map(geometry_to_json).unwrap_or(Value::Null);
    Value::Array(vec![Value::Array(ids), geometry]).to_string()
}

/// Select public, areal green space from raw map features.
///
/// With `require_tags` set, only features carrying a [`GREEN_TAGS`] tag are
/// kept; inputs that were tag-filtered upstream (and may carry no tags at all)
/// should pass `false`. Duplicates by id and geometry keep the first occurrence.
pub fn filter_green_space(features: Vec<Feature<Properties>>, require_tags: bool) -> Vec<Feature<GreenSpace>> {
    let total = features.len();
    let mut seen = AHashSet::new();

    let green = features.into_iter()
        .filter(|feature| !require_tags || category(&feature.attrs).is_some())
        .filter(|feature| seen.insert(dedup_key(feature)))
        .filter(|feature| matches!(feature.geometry, Some(Geometry::Polygon(_) | Geometry::MultiPolygon(_))))
        .filter(|feature| !is_restricted(&feature.attrs))
        .map(|feature| {
            let attrs = GreenSpace { source_id: source_id(&feature.attrs), category: category(&feature.attrs) };
            feature.with_attrs(attrs)
        })
        .collect::<Vec<_>>();

    info!(input = total, kept = green.len(), "filtered green space");
    green
}
