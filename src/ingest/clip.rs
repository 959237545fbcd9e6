use std::panic::{self, AssertUnwindSafe};

use geo::{BooleanOps, BoundingRect, Geometry, HasDimensions, Intersects, MultiPolygon};
use tracing::{debug, info};

use crate::types::Feature;

/// Cut features to a boundary. Areal geometries are intersected with it;
/// other geometries are kept whole if they touch it. Features entirely
/// outside are dropped.
pub fn clip_to_boundary<A: Clone>(features: &[Feature<A>], boundary: &MultiPolygon<f64>) -> Vec<Feature<A>> {
    let Some(bounds) = boundary.bounding_rect() else { return vec![] };

    let clipped = features.iter()
        .filter_map(|feature| {
            let geometry = feature.geometry.as_ref()?;
            if !geometry.bounding_rect().is_some_and(|rect| rect.intersects(&bounds)) { return None }

            let shape = match geometry {
                Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
                Geometry::MultiPolygon(multi) => multi.clone(),
                other => return boundary.intersects(other).then(|| feature.clone()),
            };

            match panic::catch_unwind(AssertUnwindSafe(|| shape.intersection(boundary))) {
                Ok(inside) if !inside.is_empty() =>
                    Some(Feature { geometry: Some(Geometry::MultiPolygon(inside)), attrs: feature.attrs.clone() }),
                Ok(_) => None,
                Err(_) => {
                    debug!("clip failed; keeping feature unclipped");
                    Some(feature.clone())
                }
            }
        })
        .collect::<Vec<_>>();

    info!(input = features.len(), kept = clipped.len(), "clipped to boundary");
    clipped
}
