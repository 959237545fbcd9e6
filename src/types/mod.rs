mod feature;
mod green;
mod unit;
mod unit_id;

pub use feature::{Feature, Layer, Properties};
pub use green::GreenSpace;
pub use unit::{AdminUnit, UnitSchema};
pub(crate) use unit::{ensure_unique, read_population};
pub use unit_id::UnitId;
