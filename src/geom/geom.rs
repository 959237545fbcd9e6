use geo::{BoundingRect, Coord, Polygon, Rect};
use rstar::{RTree, AABB};

use crate::geom::BoundingBox;

/// R-tree over polygon bounding boxes, used to prune overlay pairs.
#[derive(Debug, Clone)]
pub(crate) struct PolygonIndex {
    rtree: RTree<BoundingBox>,
}

impl PolygonIndex {
    /// Index polygons by position; empty polygons (no bounding box) are skipped.
    pub(crate) fn new<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                polygons.into_iter().enumerate()
                    .filter_map(|(i, polygon)| polygon.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
        }
    }

    /// Get the number of indexed polygons.
    #[inline] pub(crate) fn len(&self) -> usize { self.rtree.size() }

    /// Indices of polygons whose bounding box intersects `rect`, in ascending order.
    /// Sorted so that downstream floating-point sums do not depend on tree layout.
    pub(crate) fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut found = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(|bbox| bbox.idx())
            .collect::<Vec<_>>();
        found.sort_unstable();
        found
    }
}

/// Compute the bounding rectangle of all shapes.
pub(crate) fn total_bounds<'a, G>(shapes: impl IntoIterator<Item = &'a G>) -> Option<Rect<f64>>
where
    G: BoundingRect<f64> + 'a,
{
    shapes.into_iter()
        .filter_map(|shape| -> Option<Rect<f64>> { shape.bounding_rect().into() })
        .reduce(|a, b| Rect::new(
            Coord {
                x: a.min().x.min(b.min().x),
                y: a.min().y.min(b.min().y),
            },
            Coord {
                x: a.max().x.max(b.max().x),
                y: a.max().y.max(b.max().y),
            }
        ))
}
