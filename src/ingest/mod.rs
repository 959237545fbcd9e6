//! Adapters that prepare engine inputs: green-space selection, boundary
//! clipping, and population sourcing.

#[cfg(feature = "download")]
pub mod census;
mod clip;
pub mod green;
pub mod population;

#[cfg(feature = "download")]
pub use census::CensusApiSource;
pub use clip::clip_to_boundary;
pub use green::filter_green_space;
pub use population::{
    CsvPopulationSource, PopulationProvenance, PopulationSource, PopulationTable, SourceInfo,
    join_population, resolve_population,
};
