//! Map rendering of scored units.

pub mod color;
mod schema;
mod svg;

pub use schema::{DisplaySchema, NAME_CANDIDATES, display_values};
pub use svg::{CAPTION, render_svg, write_svg};
