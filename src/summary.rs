/// Run reports: CSV exports, the JSON summary and the console banner
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::aggregate::HexAggregate;
use crate::bounds::BoundingBox;
use crate::entropy::EntropySelection;
use crate::error::Result;
use crate::hexgrid::Lattice;
use crate::projection::{AxisTicks, Projection};
use crate::sampler::SuspiciousSpeed;

#[derive(Debug, Serialize)]
struct CellRecord {
    lattice: Lattice,
    col: usize,
    row: usize,
    center_x: f64,
    center_y: f64,
    center_lat: f64,
    center_lon: f64,
    /// Empty for a cell with no finite value (only stationary samples)
    value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SuspiciousRecord {
    from_time: String,
    from_lat: f64,
    from_lon: f64,
    to_time: String,
    to_lat: f64,
    to_lon: f64,
    speed_mph: f64,
}

#[derive(Debug, Serialize)]
struct EntropyRecord {
    grid_size: usize,
    entropy_bits: f64,
    chosen: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub locality: Option<String>,
    pub bounds: Option<BoundingBox>,
    pub files: usize,
    pub segments: usize,
    pub samples_total: usize,
    pub samples_in_bounds: usize,
    pub suspicious_speeds: usize,
    pub total_seconds: f64,
    pub projection: Projection,
    pub ticks: AxisTicks,
    pub grid_size: usize,
    pub entropy_chosen: bool,
    pub duration_range: Option<(f64, f64)>,
    pub pace_range: Option<(f64, f64)>,
}

/// One row per occupied cell, with its center in pixels and in degrees.
pub fn write_cells_csv(agg: &HexAggregate, projection: &Projection, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    for (cell, &value) in &agg.cells {
        let (center_x, center_y) = agg.grid.center(cell);
        let (center_lat, center_lon) = projection.unproject(center_x, center_y);
        wtr.serialize(CellRecord {
            lattice: cell.lattice,
            col: cell.col,
            row: cell.row,
            center_x,
            center_y,
            center_lat,
            center_lon,
            value: Some(value).filter(|v| v.is_finite()),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_entropy_csv(selection: &EntropySelection, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    for point in &selection.curve {
        wtr.serialize(EntropyRecord {
            grid_size: point.grid_size,
            entropy_bits: point.entropy_bits,
            chosen: point.grid_size == selection.chosen.grid_size,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_suspicious_csv(suspicious: &[SuspiciousSpeed], path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    for s in suspicious {
        wtr.serialize(SuspiciousRecord {
            from_time: s.last.timestamp.to_rfc3339(),
            from_lat: s.last.latitude,
            from_lon: s.last.longitude,
            to_time: s.new.timestamp.to_rfc3339(),
            to_lat: s.new.latitude,
            to_lon: s.new.longitude,
            speed_mph: s.speed_mph,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_summary_json(summary: &RunSummary, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}

pub fn print_summary(summary: &RunSummary) {
    println!("\n🏃 HEXRUNS SUMMARY");
    println!("==================");
    if let Some(locality) = &summary.locality {
        println!("📍 Locality: \"{}\"", locality);
    }
    println!(
        "📁 {} files, {} segments, {} samples ({} suspicious speeds skipped)",
        summary.files, summary.segments, summary.samples_total, summary.suspicious_speeds
    );
    if summary.bounds.is_some() {
        println!("   • {} samples inside the locality", summary.samples_in_bounds);
    }
    println!("⏱️  Total time: {:.1} hours", summary.total_seconds / 3600.0);
    println!(
        "🗺️  Map center ({:.5}, {:.5}), zoom {}",
        summary.projection.center_lat, summary.projection.center_lon, summary.projection.zoom
    );
    let picked = if summary.entropy_chosen { " (max entropy)" } else { "" };
    println!("⬡  Grid size: {}{}", summary.grid_size, picked);
    if let Some((lo, hi)) = summary.duration_range {
        println!("   • Time per region: {:.0}s to {:.0}s", lo, hi);
    }
    if let Some((lo, hi)) = summary.pace_range {
        println!("   • Fastest pace per region: {:.2} to {:.2} min/mile", lo, hi);
    }
}
