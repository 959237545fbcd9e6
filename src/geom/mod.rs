mod bbox;
mod geom;
pub mod overlay;
mod proj;
pub mod sanitize;

use bbox::BoundingBox;
pub(crate) use geom::{PolygonIndex, total_bounds};
pub use proj::{Crs, Reprojector, reproject_features};
pub use sanitize::{SanitizedPolygon, sanitize};
