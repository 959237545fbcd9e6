//! Block-group population from the Census Bureau ACS 5-year API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::ingest::population::{PopulationSource, PopulationTable, SourceInfo};

pub const DEFAULT_BASE_URL: &str = "https://api.census.gov/data";

/// Query for one county's block groups.
#[derive(Debug, Clone)]
pub struct CensusApiSource {
    pub year: u16,
    pub variable: String,
    /// Two-digit state FIPS code, e.g. `06`.
    pub state: String,
    /// Three-digit county FIPS code, e.g. `073`.
    pub county: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl CensusApiSource {
    pub fn new(year: u16, variable: impl Into<String>, state: impl Into<String>, county: impl Into<String>) -> Self {
        Self {
            year,
            variable: variable.into(),
            state: state.into(),
            county: county.into(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    fn url(&self) -> String {
        format!("{}/{}/acs/acs5", self.base_url.trim_end_matches('/'), self.year)
    }
}

impl PopulationSource for CensusApiSource {
    fn describe(&self) -> SourceInfo {
        SourceInfo { name: "census api".to_string(), year: self.year, variable: self.variable.clone() }
    }

    fn fetch(&self) -> Result<PopulationTable> {
        let url = self.url();
        let client = Client::builder()
            .user_agent(concat!("greenview/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()?;

        let mut query = vec![
            ("get", format!("NAME,{}", self.variable)),
            ("for", "block group:*".to_string()),
            ("in", format!("state:{} county:{}", self.state, self.county)),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        debug!(%url, variable = %self.variable, "querying census api");
        let body = client.get(&url).query(&query).send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned error status"))?
            .text()
            .with_context(|| format!("GET {url}: failed to read body"))?;

        let rows: Value = serde_json::from_str(&body)
            .with_context(|| format!("GET {url}: response is not JSON"))?;
        parse_census_rows(&rows, &self.variable)
    }
}

/// Parse the API's array-of-rows response (header row first) into a table
/// keyed by `GEOID = state + county + tract + block group`.
pub fn parse_census_rows(rows: &Value, variable: &str) -> Result<PopulationTable> {
    let rows = rows.as_array().ok_or_else(|| anyhow!("expected an array of rows"))?;
    let Some((header, body)) = rows.split_first() else { bail!("empty response") };

    let header = header.as_array().ok_or_else(|| anyhow!("header row is not an array"))?;
    let column = |name: &str| header.iter()
        .position(|h| h.as_str() == Some(name))
        .ok_or_else(|| anyhow!("response has no '{name}' column"));
    let keys = [column("state")?, column("county")?, column("tract")?, column("block group")?];
    let value = column(variable)?;

    let mut table = PopulationTable::new();
    for row in body {
        let row = row.as_array().ok_or_else(|| anyhow!("row is not an array"))?;
        let cell = |i: usize| row.get(i).and_then(Value::as_str);
        let geoid = keys.iter()
            .map(|&i| cell(i).ok_or_else(|| anyhow!("row is missing a geography column")))
            .collect::<Result<String>>()?;
        table.insert_raw(geoid, cell(value));
    }

    if table.is_empty() { bail!("response contains no block groups") }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::UnitId;

    #[test]
    fn assembles_geoids_and_coerces_values() {
        let rows = json!([
            ["NAME", "B01001_001E", "state", "county", "tract", "block group"],
            ["Block Group 1, Census Tract 1", "1200", "06", "073", "000100", "1"],
            ["Block Group 2, Census Tract 1", null, "06", "073", "000100", "2"],
        ]);
        let table = parse_census_rows(&rows, "B01001_001E").unwrap();
        assert_eq!(table.get(&UnitId::new("060730001001")), Some(1200));
        assert_eq!(table.get(&UnitId::new("060730001002")), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn rejects_missing_variable_and_empty_responses() {
        let rows = json!([["NAME", "state", "county", "tract", "block group"]]);
        assert!(parse_census_rows(&rows, "B01001_001E").is_err());
        assert!(parse_census_rows(&json!([]), "B01001_001E").is_err());
    }

    #[test]
    fn builds_acs5_url() {
        let mut source = CensusApiSource::new(2023, "B01001_001E", "06", "073");
        source.base_url = "http://localhost:8080/data/".to_string();
        assert_eq!(source.url(), "http://localhost:8080/data/2023/acs/acs5");
        assert_eq!(source.describe().variable, "B01001_001E");
    }
}
