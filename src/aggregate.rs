use std::collections::BTreeMap;

use crate::hexgrid::{HexCell, HexGrid};
use crate::projection::ProjectedSample;

/// How the values falling in one cell are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Min,
}

impl Reduction {
    fn combine(&self, acc: f64, value: f64) -> f64 {
        match self {
            Reduction::Sum => acc + value,
            Reduction::Min => acc.min(value),
        }
    }
}

/// Hexbin heatmap layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexLayer {
    /// Total time spent in each cell
    Duration,
    /// Fastest pace reached in each cell
    Pace,
}

impl HexLayer {
    pub fn reduction(&self) -> Reduction {
        match self {
            HexLayer::Duration => Reduction::Sum,
            HexLayer::Pace => Reduction::Min,
        }
    }

    /// Value contributed by one sample.
    pub fn value(&self, sample: &ProjectedSample) -> f64 {
        match self {
            HexLayer::Duration => sample.duration_seconds,
            HexLayer::Pace => 60.0 / sample.speed_mph,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            HexLayer::Duration => "Total time in region",
            HexLayer::Pace => "Fastest pace in region",
        }
    }
}

/// Reduced value per occupied cell. Empty cells are absent.
#[derive(Debug, Clone)]
pub struct HexAggregate {
    pub layer: HexLayer,
    pub grid: HexGrid,
    pub cells: BTreeMap<HexCell, f64>,
}

impl HexAggregate {
    pub fn get(&self, cell: &HexCell) -> Option<f64> {
        self.cells.get(cell).copied()
    }

    /// Smallest and largest finite cell values.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.cells
            .values()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Bin projected samples into `grid` and reduce each cell for `layer`.
pub fn aggregate(samples: &[ProjectedSample], grid: HexGrid, layer: HexLayer) -> HexAggregate {
    let reduction = layer.reduction();
    let mut cells: BTreeMap<HexCell, f64> = BTreeMap::new();

    for sample in samples {
        let Some(cell) = grid.cell_for(sample.x, sample.y) else {
            continue;
        };
        let value = layer.value(sample);
        cells
            .entry(cell)
            .and_modify(|acc| *acc = reduction.combine(*acc, value))
            .or_insert(value);
    }

    HexAggregate { layer, grid, cells }
}
