//! GeoJSON FeatureCollection reading and writing.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{Value, json};

use crate::{common, geom::Crs, types::{Feature, Layer, Properties}};

/// Read a FeatureCollection from `path`.
pub fn read_geojson(path: &Path) -> Result<Layer<Feature<Properties>>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("[io::geojson] Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("[io::geojson] Failed to parse {}", path.display()))?;
    parse_feature_collection(&value)
        .with_context(|| format!("[io::geojson] Invalid FeatureCollection in {}", path.display()))
}

/// Parse a FeatureCollection. The legacy `crs` member is honored; without it
/// coordinates are lon/lat.
pub fn parse_feature_collection(value: &Value) -> Result<Layer<Feature<Properties>>> {
    if value["type"].as_str() != Some("FeatureCollection") {
        bail!("expected a FeatureCollection, found {}", value["type"]);
    }

    let crs = match value.pointer("/crs/properties/name").and_then(Value::as_str) {
        Some(name) => parse_crs_name(name)?,
        None => Crs::Geographic,
    };

    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("FeatureCollection has no 'features' array"))?
        .iter().enumerate()
        .map(|(i, feature)| parse_feature(feature).with_context(|| format!("feature {i}")))
        .collect::<Result<Vec<_>>>()?;

    Ok(Layer::new(crs, features))
}

/// Interpret a CRS name such as `EPSG:3857`, `urn:ogc:def:crs:EPSG::4326` or `...:CRS84`.
pub fn parse_crs_name(name: &str) -> Result<Crs> {
    if name.ends_with("CRS84") { return Ok(Crs::Geographic) }
    name.rsplit(':').next()
        .and_then(|code| code.trim().parse::<u32>().ok())
        .and_then(Crs::from_epsg)
        .ok_or_else(|| anyhow!("unsupported CRS '{name}'"))
}

fn parse_feature(value: &Value) -> Result<Feature<Properties>> {
    let mut properties = match &value["properties"] {
        Value::Object(map) => map.clone(),
        Value::Null => Properties::new(),
        other => bail!("'properties' must be an object, found {other}"),
    };
    // Top-level feature ids (e.g. Overpass exports) are kept alongside the properties.
    if let Some(id) = value.get("id").filter(|id| !id.is_null()) {
        properties.entry("id").or_insert_with(|| id.clone());
    }

    let geometry = match value.get("geometry") {
        None | Some(Value::Null) => None,
        Some(geometry) => Some(parse_geometry(geometry)?),
    };

    Ok(Feature::new(geometry, properties))
}

/// Parse a GeoJSON geometry object of any type.
pub fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let coordinates = &value["coordinates"];
    Ok(match value["type"].as_str() {
        Some("Point") => Geometry::Point(Point::from(position(coordinates)?)),
        Some("MultiPoint") => Geometry::MultiPoint(MultiPoint::new(
            positions(coordinates)?.into_iter().map(Point::from).collect()
        )),
        Some("LineString") => Geometry::LineString(LineString::new(positions(coordinates)?)),
        Some("MultiLineString") => Geometry::MultiLineString(MultiLineString::new(
            elements(coordinates)?.iter()
                .map(|line| Ok(LineString::new(positions(line)?)))
                .collect::<Result<_>>()?
        )),
        Some("Polygon") => Geometry::Polygon(polygon(coordinates)?),
        Some("MultiPolygon") => Geometry::MultiPolygon(MultiPolygon::new(
            elements(coordinates)?.iter().map(polygon).collect::<Result<_>>()?
        )),
        Some("GeometryCollection") => Geometry::GeometryCollection(GeometryCollection::new_from(
            elements(&value["geometries"])?.iter().map(parse_geometry).collect::<Result<_>>()?
        )),
        _ => bail!("unsupported geometry type {}", value["type"]),
    })
}

fn elements(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| anyhow!("expected an array, found {value}"))
}

fn position(value: &Value) -> Result<Coord<f64>> {
    let pair = elements(value)?;
    match (pair.first().and_then(Value::as_f64), pair.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => bail!("invalid position {value}"),
    }
}

fn positions(value: &Value) -> Result<Vec<Coord<f64>>> {
    elements(value)?.iter().map(position).collect()
}

/// First ring is the exterior, the rest are holes. Rings are closed if needed.
fn polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = elements(value)?.iter()
        .map(|ring| {
            let mut ring = LineString::new(positions(ring)?);
            ring.close();
            Ok(ring)
        })
        .collect::<Result<Vec<_>>>()?;

    if rings.is_empty() { return Ok(Polygon::new(LineString::new(vec![]), vec![])) }
    let exterior = rings.remove(0);
    Ok(Polygon::new(exterior, rings))
}

/// Serialize a geometry as a GeoJSON geometry object.
pub fn geometry_to_json(geometry: &Geometry<f64>) -> Value {
    fn position(c: Coord<f64>) -> Value { json!([c.x, c.y]) }
    fn line(ls: &LineString<f64>) -> Value { Value::Array(ls.coords().copied().map(position).collect()) }
    fn rings(p: &Polygon<f64>) -> Value {
        Value::Array(std::iter::once(p.exterior()).chain(p.interiors()).map(line).collect())
    }

    match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position(p.0)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.iter().map(|p| position(p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(l) => json!({"type": "LineString", "coordinates": [position(l.start), position(l.end)]}),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": line(ls)}),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.iter().map(line).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": rings(p)}),
        Geometry::Rect(r) => json!({"type": "Polygon", "coordinates": rings(&r.to_polygon())}),
        Geometry::Triangle(t) => json!({"type": "Polygon", "coordinates": rings(&t.to_polygon())}),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.iter().map(rings).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.iter().map(geometry_to_json).collect::<Vec<_>>(),
        }),
    }
}

/// Build a FeatureCollection. When `id_field` is set, that property also
/// becomes the feature `id`. Non-geographic layers carry a `crs` member.
pub fn to_feature_collection(layer: &Layer<Feature<Properties>>, id_field: Option<&str>) -> Value {
    let features = layer.items.iter()
        .map(|feature| {
            let mut out = json!({
                "type": "Feature",
                "geometry": feature.geometry.as_ref().map(geometry_to_json).unwrap_or(Value::Null),
                "properties": feature.attrs,
            });
            if let Some(id) = id_field.and_then(|field| feature.attrs.get(field)) {
                out["id"] = id.clone();
            }
            out
        })
        .collect::<Vec<_>>();

    let mut collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if !layer.crs.is_geographic() {
        collection["crs"] = json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", layer.crs.epsg()) },
        });
    }
    collection
}

/// Write a FeatureCollection to `path` atomically.
pub fn write_geojson(path: &Path, layer: &Layer<Feature<Properties>>, id_field: Option<&str>) -> Result<()> {
    let bytes = serde_json::to_vec(&to_feature_collection(layer, id_field))
        .context("[io::geojson] Failed to serialize GeoJSON")?;
    common::write_atomic(path, &bytes)
        .with_context(|| format!("[io::geojson] Failed to write {}", path.display()))
}
