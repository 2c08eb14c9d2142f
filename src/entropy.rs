/// Grid resolution selection by entropy maximization
///
/// For every candidate grid size the duration sums of the occupied hexagons
/// are histogrammed into a few equal-width buckets. The grid size whose
/// bucket distribution has the highest Shannon entropy spreads time across
/// regions most informatively.
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::{aggregate, HexLayer};
use crate::config::MIN_ENTROPY_GRID;
use crate::error::{HexrunsError, Result};
use crate::hexgrid::HexGrid;
use crate::projection::ProjectedSample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntropyPoint {
    pub grid_size: usize,
    pub entropy_bits: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntropySelection {
    pub chosen: EntropyPoint,
    /// Entropy for every candidate, ascending grid size
    pub curve: Vec<EntropyPoint>,
}

/// Search `MIN_ENTROPY_GRID..=max_grid` for the max-entropy grid size.
pub fn select_grid_size(
    samples: &[ProjectedSample],
    dim: u32,
    max_grid: usize,
    bins: usize,
) -> Result<EntropySelection> {
    if max_grid < MIN_ENTROPY_GRID {
        return Err(HexrunsError::InvalidConfig(format!(
            "entropy search range {}..={} is empty",
            MIN_ENTROPY_GRID, max_grid
        )));
    }
    if bins == 0 {
        return Err(HexrunsError::InvalidConfig("entropy bins must be at least 1".into()));
    }

    let curve: Vec<EntropyPoint> = (MIN_ENTROPY_GRID..=max_grid)
        .into_par_iter()
        .map(|grid_size| {
            let grid = HexGrid::square(grid_size, dim);
            let sums = aggregate(samples, grid, HexLayer::Duration);
            let values: Vec<f64> = sums.cells.values().copied().collect();
            let entropy_bits = histogram_entropy(&values, bins);
            debug!(
                "grid size {} ({} rows): {} occupied cells, {:.4} bits",
                grid_size,
                grid.rows(),
                values.len(),
                entropy_bits
            );
            EntropyPoint {
                grid_size,
                entropy_bits,
            }
        })
        .collect();

    let chosen = pick_max_entropy(&curve).ok_or_else(|| {
        HexrunsError::InvalidConfig("no grid sizes to choose from".into())
    })?;
    info!(
        "Picked grid size {} with entropy {:.4} bits",
        chosen.grid_size, chosen.entropy_bits
    );

    Ok(EntropySelection { chosen, curve })
}

/// First point with the highest entropy; later ties never replace it.
pub fn pick_max_entropy(curve: &[EntropyPoint]) -> Option<EntropyPoint> {
    let mut best: Option<EntropyPoint> = None;
    for point in curve {
        match best {
            Some(b) if point.entropy_bits <= b.entropy_bits => {}
            _ => best = Some(*point),
        }
    }
    best
}

/// Shannon entropy (bits) of `values` bucketed into `bins` equal-width bins.
pub fn histogram_entropy(values: &[f64], bins: usize) -> f64 {
    let counts = histogram(values, bins);
    let total = values.len() as f64;
    if total == 0.0 {
        return 0.0;
    }

    -counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Equal-width histogram over `[min, max]`; a zero-width range is widened by ±0.5.
pub fn histogram(values: &[f64], bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    if values.is_empty() || bins == 0 {
        return counts;
    }

    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = hi - lo;
    for &v in values {
        let index = (((v - lo) / width) * bins as f64).floor() as usize;
        counts[index.min(bins - 1)] += 1;
    }
    counts
}
