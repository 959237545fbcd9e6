//! Normalizes raw feature collections into single, repaired polygons.

use std::panic::{self, AssertUnwindSafe};

use geo::{BooleanOps, CoordsIter, Geometry, HasDimensions, MultiPolygon, Polygon, Validation};
use tracing::debug;

use crate::types::Feature;

/// A single-part, non-empty polygon that survived sanitization, with the
/// attributes of the feature it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedPolygon<A> {
    pub polygon: Polygon<f64>,
    pub attrs: A,
}

/// Narrow a raw feature collection to valid single polygons.
///
/// Null geometries and non-areal types are dropped. Invalid shapes are
/// repaired when possible and kept as-is otherwise. Multi-polygons are
/// exploded, each part inheriting the parent's attributes. Never fails.
pub fn sanitize<A: Clone>(features: &[Feature<A>]) -> Vec<SanitizedPolygon<A>> {
    let mut out = Vec::with_capacity(features.len());
    let (mut null, mut non_areal, mut repaired) = (0usize, 0usize, 0usize);

    for feature in features {
        let Some(geometry) = &feature.geometry else {
            null += 1;
            continue;
        };

        let shape = match geometry {
            Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
            Geometry::MultiPolygon(multi) => multi.clone(),
            _ => {
                non_areal += 1;
                continue;
            }
        };

        let shape = match repair(&shape) {
            Some(fixed) => {
                repaired += 1;
                fixed
            }
            None => shape,
        };

        out.extend(
            shape.into_iter()
                .filter(|polygon| !polygon.is_empty())
                .map(|polygon| SanitizedPolygon { polygon, attrs: feature.attrs.clone() })
        );
    }

    debug!(input = features.len(), output = out.len(), null, non_areal, repaired, "sanitized features");
    out
}

/// Repair a self-intersecting shape by unioning it with the empty set.
/// Returns `None` when the shape is already valid or the repair fails;
/// the caller keeps the original in both cases.
fn repair(shape: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    if shape.is_valid() { return None }

    let empty = MultiPolygon::<f64>::new(vec![]);
    match panic::catch_unwind(AssertUnwindSafe(|| shape.union(&empty))) {
        Ok(fixed) if fixed.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) => Some(fixed),
        Ok(_) => {
            debug!("repair produced non-finite coordinates; keeping original shape");
            None
        }
        Err(_) => {
            debug!("repair failed; keeping original shape");
            None
        }
    }
}
