//! Format-specific reading and writing.
//!
//! - `geojson` - feature collections in and scored units out
//! - `shp` - polygon shapefiles (e.g. TIGER block groups)
//! - `csv` - population tables in and the scored attribute table out

pub mod csv;
pub mod geojson;
pub mod shp;
