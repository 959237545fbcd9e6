//! Run configuration for the `greenview` binary, read from a JSON file.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    ingest::{CsvPopulationSource, PopulationSource, SourceInfo},
    score::ScoringOptions,
    types::UnitSchema,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GREENVIEW_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "greenview.json";

/// `$GREENVIEW_CONFIG`, or `greenview.json` when unset.
pub fn config_path() -> PathBuf {
    env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inputs: InputPaths,
    /// Keep only features carrying a recognised green tag. Turn off for
    /// inputs that are already filtered and carry no tags.
    pub require_green_tags: bool,
    /// Tried in order; the first source that succeeds wins.
    pub population: Vec<PopulationSourceConfig>,
    pub unit_schema: UnitSchema,
    pub scoring: ScoringOptions,
    pub outputs: OutputPaths,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: InputPaths::default(),
            require_green_tags: true,
            population: vec![
                PopulationSourceConfig::census(2023, "B01001_001E"),
                PopulationSourceConfig::census(2023, "B01003_001E"),
                PopulationSourceConfig::census(2019, "B01003_001E"),
            ],
            unit_schema: UnitSchema::default(),
            scoring: ScoringOptions::default(),
            outputs: OutputPaths::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// Study-area boundary; units and green space are clipped to it when present.
    pub boundary: Option<PathBuf>,
    /// Unit geometries, `.shp` or `.geojson`.
    pub units: PathBuf,
    pub green_primary: PathBuf,
    pub green_fallback: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            boundary: Some(PathBuf::from("data/raw/city_boundary.geojson")),
            units: PathBuf::from("data/raw/block_groups.shp"),
            green_primary: PathBuf::from("data/raw/greenspace_raw.geojson"),
            green_fallback: PathBuf::from("data/raw/osm_greenspace.geojson"),
        }
    }
}

impl InputPaths {
    /// Green-space candidates in preference order.
    pub fn green_candidates(&self) -> [&PathBuf; 2] {
        [&self.green_primary, &self.green_fallback]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub geojson: PathBuf,
    pub csv: PathBuf,
    pub svg: Option<PathBuf>,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            geojson: PathBuf::from("data/processed/bg_metrics.geojson"),
            csv: PathBuf::from("data/processed/bg_metrics.csv"),
            svg: Some(PathBuf::from("data/processed/greenview.svg")),
        }
    }
}

/// One entry of the population source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PopulationSourceConfig {
    Csv {
        path: PathBuf,
        id_column: String,
        value_column: String,
        year: u16,
        variable: String,
    },
    CensusApi {
        year: u16,
        variable: String,
        #[serde(default = "default_state")]
        state: String,
        #[serde(default = "default_county")]
        county: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

fn default_state() -> String { "06".to_string() }

fn default_county() -> String { "073".to_string() }

impl PopulationSourceConfig {
    fn census(year: u16, variable: &str) -> Self {
        Self::CensusApi {
            year,
            variable: variable.to_string(),
            state: default_state(),
            county: default_county(),
            api_key: None,
        }
    }

    /// Instantiate the configured source.
    pub fn build(&self) -> Result<Box<dyn PopulationSource>> {
        match self {
            Self::Csv { path, id_column, value_column, year, variable } => Ok(Box::new(CsvPopulationSource {
                path: path.clone(),
                id_column: id_column.clone(),
                value_column: value_column.clone(),
                info: SourceInfo {
                    name: format!("csv:{}", path.display()),
                    year: *year,
                    variable: variable.clone(),
                },
            })),
            #[cfg(feature = "download")]
            Self::CensusApi { year, variable, state, county, api_key } => {
                let mut source = crate::ingest::CensusApiSource::new(*year, variable.as_str(), state.as_str(), county.as_str());
                source.api_key = api_key.clone();
                Ok(Box::new(source))
            }
            #[cfg(not(feature = "download"))]
            Self::CensusApi { year, variable, .. } => {
                anyhow::bail!("census API source ({variable} {year}) requires the `download` feature")
            }
        }
    }
}

impl Config {
    /// Parse a config file. Fields left out take their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Load from [`config_path`]. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() { return Ok(Self::default()) }
        Self::from_path(&path)
    }

    /// Build the population source chain in configured order.
    pub fn population_sources(&self) -> Result<Vec<Box<dyn PopulationSource>>> {
        self.population.iter().map(PopulationSourceConfig::build).collect()
    }
}
