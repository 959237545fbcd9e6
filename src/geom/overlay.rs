//! Green-space overlay: intersect green polygons with unit polygons and sum
//! the overlapping area per unit.
//!
//! Both inputs must be in the same projected, meter-based CRS. A green polygon
//! straddling two units contributes its overlap to each of them.

use ahash::AHashMap;
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use tracing::debug;

use crate::{geom::{PolygonIndex, SanitizedPolygon}, types::{AdminUnit, UnitId}};

/// Intersection of one green polygon with one unit polygon. Transient.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFragment {
    pub unit_id: UnitId,
    pub area: f64,
}

/// Per-unit areas in square meters.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaRecord {
    pub unit_id: UnitId,
    pub population: Option<i64>,
    pub blockgroup_area: f64,
    pub green_area: f64,
}

/// Intersect every green polygon with every unit polygon whose bounding box
/// it touches. Fragments are produced in (green, unit part) order.
pub fn intersect<G>(green: &[SanitizedPolygon<G>], units: &[SanitizedPolygon<UnitId>]) -> Vec<OverlayFragment> {
    let index = PolygonIndex::new(units.iter().map(|unit| &unit.polygon));

    let mut fragments = Vec::new();
    for patch in green {
        let Some(rect) = patch.polygon.bounding_rect() else { continue };
        for j in index.candidates(&rect) {
            let unit = &units[j];
            let area = patch.polygon.intersection(&unit.polygon).unsigned_area();
            if area > 0.0 {
                fragments.push(OverlayFragment { unit_id: unit.attrs.clone(), area });
            }
        }
    }

    debug!(green = green.len(), unit_parts = index.len(), fragments = fragments.len(), "computed overlay");
    fragments
}

/// Sum fragment areas by unit. Units without fragments get no entry.
pub fn sum_by_unit(fragments: &[OverlayFragment]) -> AHashMap<UnitId, f64> {
    fragments.iter().fold(AHashMap::new(), |mut acc, fragment| {
        *acc.entry(fragment.unit_id.clone()).or_insert(0.0) += fragment.area;
        acc
    })
}

/// Total polygon area of each unit, re-aggregating exploded parts.
pub fn unit_areas(units: &[SanitizedPolygon<UnitId>]) -> AHashMap<UnitId, f64> {
    units.iter().fold(AHashMap::new(), |mut acc, unit| {
        *acc.entry(unit.attrs.clone()).or_insert(0.0) += unit.polygon.unsigned_area();
        acc
    })
}

/// Merge overlapping green polygons so shared ground is only counted once
/// within a unit. This may be slow for large numbers of complex polygons.
pub fn dissolve<G>(green: &[SanitizedPolygon<G>]) -> Vec<SanitizedPolygon<()>> {
    green.iter()
        .map(|patch| MultiPolygon::new(vec![patch.polygon.clone()]))
        .reduce(|a, b| a.union(&b))
        .map(|merged| merged.into_iter()
            .map(|polygon| SanitizedPolygon { polygon, attrs: () })
            .collect())
        .unwrap_or_default()
}

/// Compute `blockgroup_area` and `green_area` for every unit, in unit order.
/// Units without overlapping green space get an explicit `0.0`.
pub fn aggregate<G>(
    units: &[AdminUnit],
    unit_parts: &[SanitizedPolygon<UnitId>],
    green: &[SanitizedPolygon<G>],
) -> Vec<AreaRecord> {
    let green_by_unit = sum_by_unit(&intersect(green, unit_parts));
    let area_by_unit = unit_areas(unit_parts);

    units.iter()
        .map(|unit| AreaRecord {
            unit_id: unit.unit_id.clone(),
            population: unit.population,
            blockgroup_area: area_by_unit.get(&unit.unit_id).copied().unwrap_or(0.0),
            green_area: green_by_unit.get(&unit.unit_id).copied().unwrap_or(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use geo::{Polygon, polygon};

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
    }

    fn part(id: &str, polygon: Polygon<f64>) -> SanitizedPolygon<UnitId> {
        SanitizedPolygon { polygon, attrs: UnitId::new(id) }
    }

    fn patch(polygon: Polygon<f64>) -> SanitizedPolygon<()> {
        SanitizedPolygon { polygon, attrs: () }
    }

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-6 }

    #[test]
    fn straddling_polygon_splits_between_units() {
        let units = vec![part("A", rect(0.0, 0.0, 100.0, 100.0)), part("B", rect(100.0, 0.0, 200.0, 100.0))];
        let green = vec![patch(rect(80.0, 10.0, 130.0, 20.0))];

        let sums = sum_by_unit(&intersect(&green, &units));
        assert!(close(sums[&UnitId::new("A")], 200.0));
        assert!(close(sums[&UnitId::new("B")], 300.0));
        assert!(sums.values().sum::<f64>() <= 500.0 + 1e-6);
    }

    #[test]
    fn edge_contact_is_not_overlap() {
        let units = vec![part("A", rect(0.0, 0.0, 10.0, 10.0))];
        let green = vec![patch(rect(10.0, 0.0, 20.0, 10.0))];
        assert!(intersect(&green, &units).is_empty());
    }

    #[test]
    fn exploded_parts_are_summed_per_unit() {
        let units = vec![part("A", rect(0.0, 0.0, 10.0, 10.0)), part("A", rect(50.0, 50.0, 60.0, 60.0))];
        let green = vec![patch(rect(0.0, 0.0, 5.0, 10.0)), patch(rect(50.0, 50.0, 60.0, 55.0))];

        assert!(close(unit_areas(&units)[&UnitId::new("A")], 200.0));
        assert!(close(sum_by_unit(&intersect(&green, &units))[&UnitId::new("A")], 100.0));
    }

    #[test]
    fn units_without_green_are_filled_with_zero() {
        let admin = vec![AdminUnit::new("A", Some(10), None), AdminUnit::new("B", None, None)];
        let units = vec![part("A", rect(0.0, 0.0, 10.0, 10.0)), part("B", rect(10.0, 0.0, 20.0, 10.0))];
        let green = vec![patch(rect(1.0, 1.0, 3.0, 3.0))];

        let records = aggregate(&admin, &units, &green);
        assert_eq!(records.len(), 2);
        assert!(close(records[0].green_area, 4.0));
        assert_eq!(records[1].green_area, 0.0);
        assert!(close(records[1].blockgroup_area, 100.0));
    }

    #[test]
    fn units_without_geometry_have_zero_area() {
        let admin = vec![AdminUnit::new("A", Some(10), None)];
        let records = aggregate::<()>(&admin, &[], &[]);
        assert_eq!(records[0].blockgroup_area, 0.0);
        assert_eq!(records[0].green_area, 0.0);
    }

    #[test]
    fn dissolve_merges_overlaps() {
        let green = vec![patch(rect(0.0, 0.0, 10.0, 10.0)), patch(rect(5.0, 0.0, 15.0, 10.0))];
        let merged = dissolve(&green);
        let area = merged.iter().map(|p| p.polygon.unsigned_area()).sum::<f64>();
        assert!(close(area, 150.0));
    }
}
