#![doc = "GreenView public API"]
pub mod commands;
mod common;
pub mod config;
mod error;
pub mod geom;
pub mod ingest;
pub mod io;
pub mod render;
pub mod score;
pub mod telemetry;
mod types;

#[doc(inline)]
pub use error::ScoreError;

#[doc(inline)]
pub use types::{AdminUnit, Feature, GreenSpace, Layer, Properties, UnitId, UnitSchema};

#[doc(inline)]
pub use geom::{Crs, SanitizedPolygon};

#[doc(inline)]
pub use score::{ScoredUnit, ScoringEngine, ScoringOptions, score_units};
