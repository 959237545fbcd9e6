//! Metric derivation and scoring.

pub mod metrics;
pub mod normalize;
mod pipeline;

pub use pipeline::{ProjectedCrs, ScoredUnit, ScoringEngine, ScoringOptions, score_units};
