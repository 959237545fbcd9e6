use thiserror::Error;

use crate::geom::Crs;

/// Input-shape errors raised by the scoring engine before any computation runs.
///
/// Data-quality defects (null geometry, invalid polygons, missing population)
/// are never reported here; they are recovered by defaulting.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// The engine was asked to run without one of its inputs.
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    /// A feature does not carry a required field.
    #[error("feature {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },

    /// A required field is present but cannot be interpreted.
    #[error("feature {index} has an invalid value for field '{field}': {reason}")]
    InvalidField { index: usize, field: String, reason: String },

    /// Two units share the same identifier.
    #[error("duplicate unit_id '{0}'")]
    DuplicateUnitId(String),

    /// Unit and green-space layers were supplied in different coordinate systems.
    #[error("coordinate system mismatch: units are in {units}, green space is in {green}")]
    CrsMismatch { units: Crs, green: Crs },

    /// A coordinate transform could not be built or applied.
    #[error("projection failed: {0}")]
    Projection(String),
}
