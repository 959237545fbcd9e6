use geo::Geometry;

use crate::geom::Crs;

/// Attribute bag of a feature read from GeoJSON or a shapefile.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A geometry (possibly null, of any type) plus attributes of type `A`.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<A> {
    pub geometry: Option<Geometry<f64>>,
    pub attrs: A,
}

impl<A> Feature<A> {
    pub fn new(geometry: Option<Geometry<f64>>, attrs: A) -> Self {
        Self { geometry, attrs }
    }

    /// Replace the attributes, keeping the geometry.
    pub fn with_attrs<B>(self, attrs: B) -> Feature<B> {
        Feature { geometry: self.geometry, attrs }
    }
}

/// A collection of items tagged with the coordinate system their geometries use.
#[derive(Debug, Clone)]
pub struct Layer<T> {
    pub crs: Crs,
    pub items: Vec<T>,
}

impl<T> Layer<T> {
    pub fn new(crs: Crs, items: Vec<T>) -> Self { Self { crs, items } }

    #[inline] pub fn len(&self) -> usize { self.items.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.items.is_empty() }
}
