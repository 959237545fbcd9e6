//! Population tables, the ordered source chain, and the join onto unit geometries.

use std::{fmt, path::PathBuf};

use ahash::AHashMap;
use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    ScoreError,
    io,
    types::{AdminUnit, Feature, Properties, UnitId, UnitSchema, read_population},
};

/// `unit_id → population`. Unparseable values are kept as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationTable {
    rows: AHashMap<UnitId, Option<i64>>,
}

impl PopulationTable {
    pub fn new() -> Self { Self::default() }

    /// Insert a raw value, coercing it the same way unit properties are read.
    /// A later row for the same unit replaces the earlier one.
    pub fn insert_raw(&mut self, unit_id: impl Into<UnitId>, raw: Option<&str>) {
        let unit_id = unit_id.into();
        let value = raw.and_then(|raw| read_population(&Value::String(raw.to_string()), unit_id.as_str()));
        if self.rows.insert(unit_id.clone(), value).is_some() {
            warn!(%unit_id, "duplicate population row; keeping the last one");
        }
    }

    /// Population of `unit_id`, or `None` when absent or unparseable.
    pub fn get(&self, unit_id: &UnitId) -> Option<i64> {
        self.rows.get(unit_id).copied().flatten()
    }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

impl<K: Into<UnitId>> FromIterator<(K, Option<i64>)> for PopulationTable {
    fn from_iter<I: IntoIterator<Item = (K, Option<i64>)>>(iter: I) -> Self {
        Self { rows: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }
}

/// What a population source delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub year: u16,
    /// Statistical variable code, e.g. `B01003_001E`.
    pub variable: String,
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.variable, self.year)
    }
}

/// A place population counts can be fetched from.
pub trait PopulationSource {
    fn describe(&self) -> SourceInfo;

    fn fetch(&self) -> Result<PopulationTable>;
}

/// Population counts from a local CSV with explicit id and value columns.
#[derive(Debug, Clone)]
pub struct CsvPopulationSource {
    pub path: PathBuf,
    pub id_column: String,
    pub value_column: String,
    pub info: SourceInfo,
}

impl PopulationSource for CsvPopulationSource {
    fn describe(&self) -> SourceInfo { self.info.clone() }

    fn fetch(&self) -> Result<PopulationTable> {
        let df = io::csv::read_csv(&self.path, &[self.id_column.as_str(), self.value_column.as_str()])?;
        let mut table = PopulationTable::new();
        for (unit_id, raw) in io::csv::string_pairs(&df, &self.id_column, &self.value_column)? {
            table.insert_raw(unit_id.trim(), raw.as_deref());
        }
        if table.is_empty() {
            bail!("{} contains no population rows", self.path.display());
        }
        Ok(table)
    }
}

/// One failed source in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAttempt {
    pub source: SourceInfo,
    pub error: String,
}

/// Which source produced the population table, and what failed before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationProvenance {
    pub source: String,
    pub year: u16,
    pub variable: String,
    pub attempts: Vec<FailedAttempt>,
    /// The winning source measures a different variable than the first
    /// (preferred) source in the chain.
    pub variable_mismatch: bool,
}

/// Try `sources` in order; the first success wins. Fails with every attempt
/// listed when none succeeds.
pub fn resolve_population(sources: &[Box<dyn PopulationSource>]) -> Result<(PopulationTable, PopulationProvenance)> {
    let Some(preferred) = sources.first().map(|source| source.describe()) else {
        bail!("no population sources configured");
    };

    let mut attempts = Vec::new();
    for source in sources {
        let info = source.describe();
        match source.fetch() {
            Ok(table) => {
                let variable_mismatch = info.variable != preferred.variable;
                if variable_mismatch {
                    warn!(
                        preferred = %preferred.variable,
                        used = %info.variable,
                        "population comes from a different variable than the preferred source"
                    );
                }
                info!(source = %info, rows = table.len(), failed = attempts.len(), "resolved population");
                let provenance = PopulationProvenance {
                    source: info.name,
                    year: info.year,
                    variable: info.variable,
                    attempts,
                    variable_mismatch,
                };
                return Ok((table, provenance));
            }
            Err(e) => {
                warn!(source = %info, error = %format!("{e:#}"), "population source failed");
                attempts.push(FailedAttempt { source: info, error: format!("{e:#}") });
            }
        }
    }

    let summary = attempts.iter()
        .map(|attempt| format!("{}: {}", attempt.source, attempt.error))
        .collect::<Vec<_>>()
        .join("; ");
    bail!("all population sources failed: {summary}")
}

/// Left-join population onto unit geometries by `unit_id`. Units missing
/// from the table get `None`, which the scorer treats as 0.
pub fn join_population(
    features: Vec<Feature<Properties>>,
    table: &PopulationTable,
    schema: &UnitSchema,
) -> Result<Vec<AdminUnit>, ScoreError> {
    let mut units = AdminUnit::from_features(features, schema)?;
    let mut missing = 0usize;
    for unit in &mut units {
        unit.population = table.get(&unit.unit_id);
        if unit.population.is_none() { missing += 1 }
    }
    if missing > 0 {
        warn!(missing, units = units.len(), "units without population; treated as 0");
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Fixed(SourceInfo, Option<PopulationTable>);

    impl PopulationSource for Fixed {
        fn describe(&self) -> SourceInfo { self.0.clone() }

        fn fetch(&self) -> Result<PopulationTable> {
            match &self.1 {
                Some(table) => Ok(table.clone()),
                None => bail!("unavailable"),
            }
        }
    }

    fn info(name: &str, variable: &str, year: u16) -> SourceInfo {
        SourceInfo { name: name.to_string(), year, variable: variable.to_string() }
    }

    fn table() -> PopulationTable {
        [("060730001001", Some(1200)), ("060730001002", None)].into_iter().collect()
    }

    #[test]
    fn first_success_wins_and_records_attempts() {
        let sources: Vec<Box<dyn PopulationSource>> = vec![
            Box::new(Fixed(info("census api", "B01001_001E", 2023), None)),
            Box::new(Fixed(info("acs 2023", "B01003_001E", 2023), Some(table()))),
            Box::new(Fixed(info("acs 2019", "B01003_001E", 2019), Some(PopulationTable::new()))),
        ];

        let (table, provenance) = resolve_population(&sources).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(provenance.source, "acs 2023");
        assert_eq!(provenance.attempts.len(), 1);
        assert!(provenance.variable_mismatch);
    }

    #[test]
    fn same_variable_is_not_a_mismatch() {
        let sources: Vec<Box<dyn PopulationSource>> = vec![
            Box::new(Fixed(info("acs 2023", "B01003_001E", 2023), None)),
            Box::new(Fixed(info("acs 2019", "B01003_001E", 2019), Some(table()))),
        ];
        let (_, provenance) = resolve_population(&sources).unwrap();
        assert_eq!(provenance.year, 2019);
        assert!(!provenance.variable_mismatch);
    }

    #[test]
    fn all_failures_are_reported() {
        let sources: Vec<Box<dyn PopulationSource>> = vec![
            Box::new(Fixed(info("first", "A", 2023), None)),
            Box::new(Fixed(info("second", "B", 2019), None)),
        ];
        let message = resolve_population(&sources).unwrap_err().to_string();
        assert!(message.contains("first") && message.contains("second"));
        assert!(resolve_population(&[]).is_err());
    }

    #[test]
    fn raw_values_are_coerced() {
        let mut table = PopulationTable::new();
        table.insert_raw("A", Some("35"));
        table.insert_raw("B", Some("N/A"));
        table.insert_raw("C", None);
        assert_eq!(table.get(&UnitId::new("A")), Some(35));
        assert_eq!(table.get(&UnitId::new("B")), None);
        assert_eq!(table.get(&UnitId::new("Z")), None);
    }

    #[test]
    fn join_is_a_left_join() {
        let features = ["060730001001", "060730001003"].iter()
            .map(|id| Feature::new(None, json!({"GEOID": id}).as_object().cloned().unwrap()))
            .collect();
        let units = join_population(features, &table(), &UnitSchema::default()).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].population, Some(1200));
        assert_eq!(units[1].population, None);
    }

    #[test]
    fn csv_source_reads_explicit_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        std::fs::write(&path, "GEOID,B01003_001E\n060730001001,1200\n060730001002,-666666666\n").unwrap();

        let source = CsvPopulationSource {
            path,
            id_column: "GEOID".to_string(),
            value_column: "B01003_001E".to_string(),
            info: info("acs csv", "B01003_001E", 2023),
        };
        let table = source.fetch().unwrap();
        assert_eq!(table.get(&UnitId::new("060730001001")), Some(1200));
        assert_eq!(table.get(&UnitId::new("060730001002")), Some(-666666666));
    }
}
