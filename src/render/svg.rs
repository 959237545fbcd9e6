//! Choropleth SVG export.

use std::{io::Write, path::Path};

use anyhow::{Context, Result, anyhow};
use geo::{Coord, CoordsIter, Geometry, LineString, MultiPolygon, Rect};

use crate::{
    common,
    geom::{Crs, Reprojector, total_bounds},
    render::{DisplaySchema, color, display_values},
    types::{Feature, Layer, Properties},
};

pub const CAPTION: &str = "GreenView Score 1-100";

const LEGEND_HEIGHT: f64 = 48.0;

/// Projection function: projected map coords -> SVG coords (x,y)
type Projection = dyn Fn(&Coord<f64>) -> (f64, f64);

/// Render the layer as an SVG document string, `width` pixels wide.
pub fn render_svg(layer: &Layer<Feature<Properties>>, schema: &DisplaySchema, width: f64, margin: f64) -> Result<String> {
    schema.validate(&layer.items)?;

    // Draw in Web Mercator so shapes keep their familiar proportions.
    let to_screen_crs = if layer.crs.is_geographic() { Crs::WebMercator } else { layer.crs };
    let reprojector = Reprojector::new(layer.crs, to_screen_crs)?;
    let shapes = layer.items.iter()
        .map(|feature| -> Result<Option<MultiPolygon<f64>>> {
            Ok(match &feature.geometry {
                Some(Geometry::Polygon(p)) => Some(MultiPolygon::new(vec![reprojector.geometry(p)?])),
                Some(Geometry::MultiPolygon(mp)) => Some(reprojector.geometry(mp)?),
                _ => None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let bounds = total_bounds(shapes.iter().flatten())
        .filter(|b| b.width() > 0.0 && b.height() > 0.0)
        .ok_or_else(|| anyhow!("[to_svg] Could not determine bounds; nothing to draw."))?;

    let scale = (width - 2.0 * margin) / bounds.width();
    let map_height = bounds.height() * scale + 2.0 * margin;
    let height = map_height + LEGEND_HEIGHT;

    // --- Map projected coords -> SVG coords (preserve aspect, Y down) ---
    let project = move |coord: &Coord<f64>| -> (f64, f64) {
        let x = margin + (coord.x - bounds.min().x) * scale;
        let y = margin + (bounds.max().y - coord.y) * scale; // invert vertically
        (x, y)
    };

    let raw = schema.scores(&layer.items);
    let display = display_values(&raw);

    let mut out = Vec::new();
    write_header(&mut out, width, height, &bounds)?;
    write_styles(&mut out)?;
    for (((feature, shape), raw), display) in layer.items.iter().zip(&shapes).zip(&raw).zip(&display) {
        let Some(shape) = shape else { continue };
        writeln!(out, r#"<path class="unit" d="{}" style="fill:{}"><title>{}&#10;GreenView Score: {}&#10;Raw Metric ({}): {}</title></path>"#,
            multipolygon_to_path(shape, &project),
            color::green_ramp(*display),
            escape(&schema.label(feature)),
            format_score(*display),
            escape(&schema.score_field),
            format_score(*raw),
        )?;
    }
    write_legend(&mut out, width, map_height, margin)?;
    writeln!(out, "</svg>")?;

    String::from_utf8(out).context("[to_svg] SVG output is not valid UTF-8")
}

/// Write the choropleth to `path` atomically.
pub fn write_svg(path: &Path, layer: &Layer<Feature<Properties>>, schema: &DisplaySchema) -> Result<()> {
    let svg = render_svg(layer, schema, 1200.0, 10.0)?;
    common::write_atomic(path, svg.as_bytes())
        .with_context(|| format!("[to_svg] Failed to write {}", path.display()))
}

fn write_header(writer: &mut impl Write, width: f64, height: f64, bounds: &Rect<f64>) -> Result<()> {
    writeln!(writer, r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"##)?;
    writeln!(writer, r##"<svg xmlns="http://www.w3.org/2000/svg"
        width="{width}" height="{height}"
        viewBox="0 0 {width} {height}"
        data-x-min="{x_min}" data-x-max="{x_max}"
        data-y-min="{y_min}" data-y-max="{y_max}">"##,
        x_min = bounds.min().x,
        x_max = bounds.max().x,
        y_min = bounds.min().y,
        y_max = bounds.max().y,
    )?;
    writeln!(writer, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##)?;
    Ok(())
}

fn write_styles(writer: &mut impl Write) -> Result<()> {
    writeln!(writer, r##"<defs>
<style>
    .unit {{ stroke: #555555; stroke-width: 0.4; fill-opacity: 0.8; }}
    .unit:hover {{ stroke: #000000; stroke-width: 2; }}
    .legend {{ font: 12px sans-serif; fill: #111827; }}
</style>
</defs>"##)?;
    Ok(())
}

/// One swatch per ramp stop, labelled at both ends, with the caption above.
fn write_legend(writer: &mut impl Write, width: f64, top: f64, margin: f64) -> Result<()> {
    let swatch = ((width - 2.0 * margin) / 3.0 / color::YL_GN_9.len() as f64).max(1.0);
    let y = top + 18.0;

    writeln!(writer, r#"<g class="legend">"#)?;
    writeln!(writer, r#"<text x="{margin}" y="{:.1}">{CAPTION}</text>"#, top + 12.0)?;
    for (i, rgb) in color::YL_GN_9.iter().enumerate() {
        writeln!(writer, r#"<rect x="{:.1}" y="{y:.1}" width="{swatch:.1}" height="12" fill="{rgb}"/>"#, margin + i as f64 * swatch)?;
    }
    let end = margin + color::YL_GN_9.len() as f64 * swatch;
    writeln!(writer, r#"<text x="{margin}" y="{:.1}">1</text>"#, y + 26.0)?;
    writeln!(writer, r#"<text x="{end:.1}" y="{:.1}" text-anchor="end">100</text>"#, y + 26.0)?;
    writeln!(writer, "</g>")?;
    Ok(())
}

fn format_score(value: f64) -> String {
    if value.is_finite() { format!("{value}") } else { "n/a".to_string() }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Build a compact SVG path string for a MultiPolygon (exteriors + holes).
fn multipolygon_to_path(shape: &MultiPolygon<f64>, project: &Projection) -> String {
    let mut out = String::new();

    for polygon in &shape.0 {
        out.push_str(&ring_to_path(polygon.exterior(), project));
        for interior in polygon.interiors() {
            out.push_str(&ring_to_path(interior, project));
        }
    }

    out
}

/// Build a compact SVG path string for a LineString (ring).
fn ring_to_path(ring: &LineString<f64>, project: &Projection) -> String {
    let mut out = String::new();

    let mut coords = ring.coords_iter()
        .map(|coord| project(&coord));
    if let Some((x, y)) = coords.next() {
        out.push_str(&format!(" M{x:.3},{y:.3}"));
        for (x, y) in coords {
            out.push_str(&format!(" L{x:.3},{y:.3}"));
        }
        out.push('Z');
    }

    out
}
