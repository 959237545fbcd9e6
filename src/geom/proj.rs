use std::fmt;

use geo::{Coord, Geometry, MapCoords, Rect};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use serde::{Deserialize, Serialize};

use crate::{ScoreError, types::Feature};

/// Coordinate reference systems the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Crs {
    /// Longitude/latitude in degrees (EPSG:4326; EPSG:4269 is treated as equivalent).
    Geographic,
    /// Spherical "pseudo" Mercator in meters (EPSG:3857).
    WebMercator,
    /// WGS84 UTM in meters.
    Utm { zone: u8, south: bool },
}

impl Crs {
    /// Map an EPSG code to a supported CRS.
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 | 4269 | 4258 | 4937 => Some(Self::Geographic),
            3857 | 3785 | 900913 => Some(Self::WebMercator),
            32601..=32660 => Some(Self::Utm { zone: (code - 32600) as u8, south: false }),
            32701..=32760 => Some(Self::Utm { zone: (code - 32700) as u8, south: true }),
            _ => None,
        }
    }

    /// EPSG code of this CRS.
    pub fn epsg(&self) -> u32 {
        match self {
            Self::Geographic => 4326,
            Self::WebMercator => 3857,
            Self::Utm { zone, south: false } => 32600 + *zone as u32,
            Self::Utm { zone, south: true } => 32700 + *zone as u32,
        }
    }

    #[inline] pub fn is_geographic(&self) -> bool { matches!(self, Self::Geographic) }

    /// Pick the UTM zone containing the center of `bounds` (given in lon/lat).
    pub fn utm_for(bounds: Option<Rect<f64>>) -> Self {
        let center = if let Some(b) = bounds { b.center() }
        else { Coord { x: -117.0, y: 33.0 } }; // Southern California (fallback)

        let zone = (((center.x + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Self::Utm { zone, south: center.y < 0.0 }
    }

    /// PROJ.4 definition. Web Mercator is paired with a spherical lon/lat
    /// source so that no datum shift is applied, matching EPSG:3857.
    fn proj4(&self, partner: Crs) -> String {
        match self {
            Self::Geographic if partner == Self::WebMercator =>
                "+proj=longlat +a=6378137 +b=6378137 +no_defs +type=crs".to_string(),
            Self::Geographic =>
                "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            Self::WebMercator =>
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs".to_string(),
            Self::Utm { zone, south } => {
                let south = if *south { " +south" } else { "" };
                format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs")
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Transforms geometries between two CRSs. Projected-to-projected transforms
/// go through geographic coordinates.
pub struct Reprojector {
    steps: Vec<(Proj4, Proj4, Crs, Crs)>,
}

impl Reprojector {
    pub fn new(from: Crs, to: Crs) -> Result<Self, ScoreError> {
        let pairs = if from == to { vec![] }
        else if from.is_geographic() || to.is_geographic() { vec![(from, to)] }
        else { vec![(from, Crs::Geographic), (Crs::Geographic, to)] };

        let build = |crs: Crs, partner: Crs| {
            let proj_string = crs.proj4(partner);
            Proj4::from_proj_string(&proj_string)
                .map_err(|e| ScoreError::Projection(format!("failed to build PROJ.4 '{proj_string}': {e:?}")))
        };

        let steps = pairs.into_iter()
            .map(|(a, b)| Ok((build(a, b)?, build(b, a)?, a, b)))
            .collect::<Result<Vec<_>, ScoreError>>()?;

        Ok(Self { steps })
    }

    /// Reproject a single coordinate.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, ScoreError> {
        self.steps.iter().try_fold(coord, |coord, (from, to, from_crs, to_crs)| {
            // Geographic coordinates go in and come out of proj4rs in radians.
            let mut point = if from_crs.is_geographic() {
                (coord.x.to_radians(), coord.y.to_radians(), 0.0)
            } else {
                (coord.x, coord.y, 0.0)
            };
            transform(from, to, &mut point)
                .map_err(|e| ScoreError::Projection(format!("{from_crs} -> {to_crs} failed at ({}, {}): {e:?}", coord.x, coord.y)))?;
            let out = if to_crs.is_geographic() {
                Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
            } else {
                Coord { x: point.0, y: point.1 }
            };
            if out.x.is_finite() && out.y.is_finite() { Ok(out) }
            else { Err(ScoreError::Projection(format!("{from_crs} -> {to_crs} produced a non-finite coordinate"))) }
        })
    }

    /// Reproject every coordinate of a geometry.
    pub fn geometry<G>(&self, geometry: &G) -> Result<G::Output, ScoreError>
    where
        G: MapCoords<f64, f64>,
    {
        geometry.try_map_coords(|coord| self.coord(coord))
    }
}

/// Reproject the geometries of a feature set, keeping attributes.
pub fn reproject_features<A: Clone>(features: &[Feature<A>], from: Crs, to: Crs) -> Result<Vec<Feature<A>>, ScoreError> {
    let reprojector = Reprojector::new(from, to)?;
    features.iter()
        .map(|feature| Ok(Feature {
            geometry: feature.geometry.as_ref()
                .map(|geometry: &Geometry<f64>| reprojector.geometry(geometry))
                .transpose()?,
            attrs: feature.attrs.clone(),
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool { (a - b).abs() <= tol }

    #[test]
    fn epsg_codes_round_trip() {
        for crs in [Crs::Geographic, Crs::WebMercator, Crs::Utm { zone: 11, south: false }, Crs::Utm { zone: 33, south: true }] {
            assert_eq!(Crs::from_epsg(crs.epsg()), Some(crs));
        }
        assert_eq!(Crs::from_epsg(4269), Some(Crs::Geographic));
        assert_eq!(Crs::from_epsg(2230), None);
    }

    #[test]
    fn utm_zone_from_bounds() {
        let rect = Rect::new(Coord { x: -117.3, y: 32.5 }, Coord { x: -116.9, y: 33.1 });
        assert_eq!(Crs::utm_for(Some(rect)), Crs::Utm { zone: 11, south: false });
    }

    #[test]
    fn web_mercator_matches_known_values() {
        let reprojector = Reprojector::new(Crs::Geographic, Crs::WebMercator).unwrap();
        let origin = reprojector.coord(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert!(close(origin.x, 0.0, 1e-6) && close(origin.y, 0.0, 1e-6));

        // One degree of longitude at the equator on the 6378137 m sphere.
        let east = reprojector.coord(Coord { x: 1.0, y: 0.0 }).unwrap();
        assert!(close(east.x, 111_319.490_793, 1e-3), "got {}", east.x);
    }

    #[test]
    fn round_trip_through_projection() {
        let there = Reprojector::new(Crs::Geographic, Crs::WebMercator).unwrap();
        let back = Reprojector::new(Crs::WebMercator, Crs::Geographic).unwrap();
        let start = Coord { x: -117.1611, y: 32.7157 };
        let end = back.coord(there.coord(start).unwrap()).unwrap();
        assert!(close(start.x, end.x, 1e-9) && close(start.y, end.y, 1e-9));
    }

    #[test]
    fn identity_when_crs_matches() {
        let reprojector = Reprojector::new(Crs::WebMercator, Crs::WebMercator).unwrap();
        let coord = Coord { x: 12.5, y: -3.0 };
        assert_eq!(reprojector.coord(coord).unwrap(), coord);
    }
}
