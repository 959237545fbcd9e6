use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geo::MultiPolygon;
use tracing::{info, warn};

use crate::{
    common,
    config::Config,
    geom::{Crs, overlay, reproject_features, sanitize},
    ingest::{clip_to_boundary, filter_green_space, join_population, resolve_population},
    io,
    render::{self, DisplaySchema},
    score::{ScoredUnit, ScoringEngine},
    types::{Feature, Layer, Properties},
};

const SVG_WIDTH: f64 = 1200.0;
const SVG_MARGIN: f64 = 10.0;

/// Read an input layer, dispatching on the file extension.
pub fn read_layer(path: &Path) -> Result<Layer<Feature<Properties>>> {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("shp") => io::shp::read_shapefile(path),
        _ => io::geojson::read_geojson(path),
    }
}

/// Dissolve every areal feature of the boundary file into one shape in `crs`.
fn load_boundary(path: &Path, crs: Crs) -> Result<MultiPolygon<f64>> {
    let layer = read_layer(path)?;
    let features = reproject_features(&layer.items, layer.crs, crs)?;
    let parts = overlay::dissolve(&sanitize(&features));
    if parts.is_empty() {
        anyhow::bail!("Boundary {} has no areal geometry", path.display());
    }
    Ok(MultiPolygon::new(parts.into_iter().map(|part| part.polygon).collect()))
}

/// Run the whole pipeline described by `config` and write its outputs.
/// Returns the path of the scored GeoJSON.
pub fn run(config: &Config) -> Result<PathBuf> {
    let green_path = common::first_existing(config.inputs.green_candidates())?;
    let raw_green = read_layer(green_path)?;
    info!(path = %green_path.display(), features = raw_green.len(), "read green space");
    let green_crs = raw_green.crs;
    let green = filter_green_space(raw_green.items, config.require_green_tags);

    let sources = config.population_sources()?;
    let (population, provenance) = resolve_population(&sources)?;
    info!(
        source = %provenance.source,
        year = provenance.year,
        variable = %provenance.variable,
        variable_mismatch = provenance.variable_mismatch,
        "population provenance"
    );

    let raw_units = read_layer(&config.inputs.units)
        .with_context(|| format!("Failed to load unit geometries from {}", config.inputs.units.display()))?;
    let crs = raw_units.crs;
    let mut unit_features = raw_units.items;
    let mut green = reproject_features(&green, green_crs, crs)?;

    match &config.inputs.boundary {
        Some(path) if path.exists() => {
            let boundary = load_boundary(path, crs)?;
            let before = unit_features.len();
            unit_features = clip_to_boundary(&unit_features, &boundary);
            green = clip_to_boundary(&green, &boundary);
            info!(dropped = before - unit_features.len(), units = unit_features.len(), "clipped units to boundary");
        }
        Some(path) => warn!(path = %path.display(), "boundary not found; inputs are not clipped"),
        None => {}
    }
    let units = join_population(unit_features, &population, &config.unit_schema)?;

    let scored = ScoringEngine::new(config.scoring.clone())
        .units(Layer::new(crs, units))
        .green_space(Layer::new(crs, green))
        .run()?;

    write_outputs(config, &scored)?;
    Ok(config.outputs.geojson.clone())
}

/// Encode every output in memory, then write each file atomically. A failure
/// while encoding leaves no output on disk.
fn write_outputs(config: &Config, scored: &Layer<ScoredUnit>) -> Result<()> {
    let features = Layer::new(scored.crs, scored.items.iter().map(ScoredUnit::to_feature).collect());

    let geojson = serde_json::to_vec(&io::geojson::to_feature_collection(&features, Some("unit_id")))
        .context("[io::geojson] Failed to serialize GeoJSON")?;
    let csv = io::csv::scored_csv_bytes(&scored.items)?;
    let mut outputs: Vec<(&Path, Vec<u8>)> = vec![
        (config.outputs.geojson.as_path(), geojson),
        (config.outputs.csv.as_path(), csv),
    ];
    if let Some(path) = &config.outputs.svg {
        let schema = DisplaySchema::from_candidates(&features.items, "green_score");
        let svg = render::render_svg(&features, &schema, SVG_WIDTH, SVG_MARGIN)?;
        outputs.push((path.as_path(), svg.into_bytes()));
    }

    for (path, bytes) in &outputs {
        common::write_atomic(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    info!(files = outputs.len(), units = scored.len(), geojson = %config.outputs.geojson.display(), "wrote outputs");
    Ok(())
}
