//! CSV reading and writing via polars.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use polars::{
    frame::DataFrame,
    io::{SerReader, SerWriter},
    prelude::{CsvReadOptions, CsvWriter, DataType, Field, NamedFrom, Schema},
    series::Series,
};

use crate::{common, score::ScoredUnit};

/// Read a CSV with a header row. The named columns are read as strings so
/// identifiers keep their leading zeros.
pub fn read_csv(path: &Path, string_columns: &[&str]) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;

    let schema = Schema::from_iter(string_columns.iter()
        .map(|&name| Field::new(name.into(), DataType::String)));

    CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(Arc::new(schema)))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {}", path.display()))
}

/// Two string columns of `df` as `(key, value)` pairs; rows with a null key are skipped.
pub fn string_pairs(df: &DataFrame, key: &str, value: &str) -> Result<Vec<(String, Option<String>)>> {
    let keys = df.column(key)
        .with_context(|| format!("[io::csv] missing column {key:?}"))?
        .cast(&DataType::String)?;
    let values = df.column(value)
        .with_context(|| format!("[io::csv] missing column {value:?}"))?
        .cast(&DataType::String)?;

    Ok(keys.str()?.into_iter()
        .zip(values.str()?.into_iter())
        .filter_map(|(k, v)| k.map(|k| (k.to_string(), v.map(str::to_string))))
        .collect())
}

/// The scored attribute table (no geometry) as a DataFrame.
pub fn scored_frame(units: &[ScoredUnit]) -> Result<DataFrame> {
    let mut columns = vec![
        Series::new("unit_id".into(), units.iter().map(|u| u.unit_id.to_string()).collect::<Vec<_>>()),
    ];
    if units.iter().any(|u| u.name.is_some()) {
        columns.push(Series::new("name".into(), units.iter().map(|u| u.name.clone()).collect::<Vec<_>>()));
    }
    columns.extend([
        Series::new("population".into(), units.iter().map(|u| u.population).collect::<Vec<_>>()),
        Series::new("blockgroup_area".into(), units.iter().map(|u| u.blockgroup_area).collect::<Vec<_>>()),
        Series::new("green_area".into(), units.iter().map(|u| u.green_area).collect::<Vec<_>>()),
        Series::new("green_percentage".into(), units.iter().map(|u| u.green_percentage).collect::<Vec<_>>()),
        Series::new("green_area_per_person".into(), units.iter().map(|u| u.green_area_per_person).collect::<Vec<_>>()),
        Series::new("green_score".into(), units.iter().map(|u| u.green_score).collect::<Vec<_>>()),
    ]);

    DataFrame::new(columns.into_iter().map(Into::into).collect())
        .context("[io::csv::write] Failed to build scored table")
}

/// The scored attribute table encoded as CSV, header first.
pub fn scored_csv_bytes(units: &[ScoredUnit]) -> Result<Vec<u8>> {
    let mut df = scored_frame(units)?;
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(&mut df)
        .context("[io::csv::write] Failed to write CSV to bytes")?;
    Ok(out)
}

/// Write the scored attribute table to `path` atomically.
pub fn write_scored_csv(path: &Path, units: &[ScoredUnit]) -> Result<()> {
    common::write_atomic(path, &scored_csv_bytes(units)?)
        .with_context(|| format!("[io::csv::write] Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use geo::MultiPolygon;

    use super::*;
    use crate::types::UnitId;

    fn unit(id: &str, score: f64) -> ScoredUnit {
        ScoredUnit {
            unit_id: UnitId::new(id),
            name: None,
            population: 100,
            blockgroup_area: 10_000.0,
            green_area: 2_500.0,
            green_percentage: 0.25,
            green_area_per_person: 25.0,
            green_score: score,
            geometry: MultiPolygon::new(vec![]),
        }
    }

    #[test]
    fn reads_ids_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        std::fs::write(&path, "GEOID,population\n060730001001,1200\n060730001002,N/A\n").unwrap();

        let df = read_csv(&path, &["GEOID", "population"]).unwrap();
        let pairs = string_pairs(&df, "GEOID", "population").unwrap();
        assert_eq!(pairs, vec![
            ("060730001001".to_string(), Some("1200".to_string())),
            ("060730001002".to_string(), Some("N/A".to_string())),
        ]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        std::fs::write(&path, "GEOID,total\n1,2\n").unwrap();

        let df = read_csv(&path, &["GEOID"]).unwrap();
        assert!(string_pairs(&df, "GEOID", "population").is_err());
    }

    #[test]
    fn writes_scored_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        write_scored_csv(&path, &[unit("060730001001", 100.0), unit("060730001002", 1.0)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "unit_id,population,blockgroup_area,green_area,green_percentage,green_area_per_person,green_score",
        );
        assert!(lines.next().unwrap().starts_with("060730001001,100,"));
        assert_eq!(text.lines().count(), 3);
    }
}
