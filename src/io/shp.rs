//! Polygon shapefile reading (e.g. TIGER/Line block groups).

use std::path::Path;

use anyhow::{Context, Result, bail};
use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde_json::{Value, json};
use shapefile::{self as shp, PolygonRing, Reader, Shape, dbase::FieldValue};
use tracing::{debug, warn};

use crate::{geom::Crs, types::{Feature, Layer, Properties}};

/// Read every shape and its attribute record from a `.shp` file. The CRS
/// comes from the `.prj` sidecar; without one, lon/lat is assumed.
pub fn read_shapefile(path: &Path) -> Result<Layer<Feature<Properties>>> {
    let crs = read_prj(&path.with_extension("prj"))?;

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp] Failed to open shapefile: {}", path.display()))?;

    let mut features = Vec::with_capacity(reader.shape_count().unwrap_or(0));
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp] Error reading shape+record from {}", path.display()))?;
        let properties = record.into_iter()
            .map(|(field, value)| (field, field_to_json(value)))
            .collect::<Properties>();
        features.push(Feature::new(shape_to_geometry(&shape), properties));
    }

    debug!(path = %path.display(), features = features.len(), %crs, "read shapefile");
    Ok(Layer::new(crs, features))
}

/// Detect the CRS of a shapefile from its WKT `.prj` sidecar.
fn read_prj(path: &Path) -> Result<Crs> {
    if !path.exists() {
        warn!(path = %path.display(), "no .prj sidecar; assuming lon/lat");
        return Ok(Crs::Geographic);
    }
    let wkt = std::fs::read_to_string(path)
        .with_context(|| format!("[io::shp] Failed to read {}", path.display()))?;
    crs_from_wkt(&wkt).with_context(|| format!("[io::shp] Unsupported projection in {}", path.display()))
}

/// Recognize the handful of ESRI WKT projections the pipeline supports.
pub(crate) fn crs_from_wkt(wkt: &str) -> Result<Crs> {
    let wkt = wkt.trim();
    if wkt.starts_with("GEOGCS") { return Ok(Crs::Geographic) }

    let upper = wkt.to_ascii_uppercase();
    if upper.contains("AUXILIARY_SPHERE") || upper.contains("PSEUDO") || upper.contains("POPULAR_VISUALISATION") {
        return Ok(Crs::WebMercator);
    }

    // e.g. PROJCS["WGS_1984_UTM_Zone_11N", ...] or PROJCS["WGS 84 / UTM zone 11N", ...]
    if let Some(pos) = upper.find("UTM_ZONE_").map(|p| p + 9).or_else(|| upper.find("UTM ZONE ").map(|p| p + 9)) {
        let tail = &upper[pos..];
        let digits = tail.chars().take_while(char::is_ascii_digit).collect::<String>();
        let hemisphere = tail[digits.len()..].chars().next();
        if let (Ok(zone @ 1..=60), Some(h @ ('N' | 'S'))) = (digits.parse::<u8>(), hemisphere) {
            return Ok(Crs::Utm { zone, south: h == 'S' });
        }
    }

    bail!("unrecognized projection: {}", wkt.chars().take(80).collect::<String>())
}

fn shape_to_geometry(shape: &Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::Polygon(polygon) => Some(Geometry::MultiPolygon(polygon_to_geo(polygon))),
        Shape::Point(point) => Some(Geometry::Point(Point::new(point.x, point.y))),
        Shape::NullShape => None,
        other => {
            debug!(shape_type = ?other.shapetype(), "skipping unsupported shape type");
            None
        }
    }
}

/// Group rings into polygons: each outer ring owns the inner rings that
/// follow it. An inner ring with no preceding outer ring is promoted.
fn polygon_to_geo(polygon: &shp::Polygon) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in polygon.rings() {
        let mut line = LineString::new(ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect());
        line.close();
        match (ring, &exterior) {
            (PolygonRing::Inner(_), Some(_)) => holes.push(line),
            _ => {
                if let Some(outer) = exterior.take() {
                    polygons.push(Polygon::new(outer, std::mem::take(&mut holes)));
                }
                exterior = Some(line);
            }
        }
    }
    if let Some(outer) = exterior {
        polygons.push(Polygon::new(outer, holes));
    }

    MultiPolygon::new(polygons)
}

/// dBase values as JSON. Whole numbers become integers so that numeric
/// identifiers and counts survive unchanged.
fn field_to_json(value: FieldValue) -> Value {
    fn number(n: f64) -> Value {
        if n.fract() == 0.0 && n.abs() < 9.0e15 { json!(n as i64) } else { json!(n) }
    }

    match value {
        FieldValue::Character(s) => s.map(|s| Value::String(s.trim().to_string())).unwrap_or(Value::Null),
        FieldValue::Numeric(n) => n.map(number).unwrap_or(Value::Null),
        FieldValue::Float(f) => f.map(|f| number(f as f64)).unwrap_or(Value::Null),
        FieldValue::Integer(i) => json!(i),
        FieldValue::Double(d) => number(d),
        FieldValue::Logical(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_projections() {
        let nad83 = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137,298.257222101]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#;
        assert_eq!(crs_from_wkt(nad83).unwrap(), Crs::Geographic);

        let mercator = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(crs_from_wkt(mercator).unwrap(), Crs::WebMercator);

        let utm = r#"PROJCS["WGS_1984_UTM_Zone_10N",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(crs_from_wkt(utm).unwrap(), Crs::Utm { zone: 10, south: false });

        let state_plane = r#"PROJCS["NAD_1983_StatePlane_California_III_FIPS_0403_Feet",GEOGCS["GCS_North_American_1983"]]"#;
        assert!(crs_from_wkt(state_plane).is_err());
    }

    #[test]
    fn groups_holes_with_their_outer_ring() {
        let pts = |coords: &[(f64, f64)]| coords.iter().map(|&(x, y)| shp::Point { x, y }).collect::<Vec<_>>();
        let polygon = shp::Polygon::with_rings(vec![
            PolygonRing::Outer(pts(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)])),
            PolygonRing::Inner(pts(&[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)])),
            PolygonRing::Outer(pts(&[(20.0, 0.0), (20.0, 5.0), (25.0, 5.0), (25.0, 0.0), (20.0, 0.0)])),
        ]);

        let geo = polygon_to_geo(&polygon);
        assert_eq!(geo.0.len(), 2);
        assert_eq!(geo.0[0].interiors().len(), 1);
        assert!(geo.0[1].interiors().is_empty());
    }

    #[test]
    fn numeric_fields_keep_integers() {
        assert_eq!(field_to_json(FieldValue::Numeric(Some(1200.0))), json!(1200));
        assert_eq!(field_to_json(FieldValue::Numeric(Some(0.5))), json!(0.5));
        assert_eq!(field_to_json(FieldValue::Character(Some("060730001001 ".to_string()))), json!("060730001001"));
        assert_eq!(field_to_json(FieldValue::Numeric(None)), Value::Null);
    }
}
