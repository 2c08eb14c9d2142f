//! Hexagonal tiling of a rectangular pixel extent.
//!
//! Two interleaved rectangular lattices of hexagon centers cover the extent:
//! the primary lattice has `(nx + 1) × (ny + 1)` centers on whole grid steps,
//! the offset lattice `nx × ny` centers shifted half a step in both axes. A
//! point belongs to whichever nearest center is closer under `dx² + 3·dy²`
//! in grid-step units, which is exactly the hexagon containing it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Lattice {
    Primary,
    Offset,
}

/// Identity of one hexagon in a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HexCell {
    pub lattice: Lattice,
    pub col: usize,
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexGrid {
    pub gridsize: usize,
    xmin: f64,
    ymin: f64,
    nx: usize,
    ny: usize,
    sx: f64,
    sy: f64,
}

impl HexGrid {
    /// Grid with `gridsize` hexagons across `[xmin, xmax]`.
    pub fn new(gridsize: usize, (xmin, xmax): (f64, f64), (ymin, ymax): (f64, f64)) -> Self {
        let nx = gridsize.max(1);
        let ny = ((nx as f64 / 3f64.sqrt()) as usize).max(1);

        // Pad x so points exactly on the right edge still land in range
        let padding = 1e-9 * (xmax - xmin);
        let xmin = xmin - padding;
        let xmax = xmax + padding;

        HexGrid {
            gridsize: nx,
            xmin,
            ymin,
            nx,
            ny,
            sx: (xmax - xmin) / nx as f64,
            sy: (ymax - ymin) / ny as f64,
        }
    }

    /// Grid over a square `0..dim` pixel image.
    pub fn square(gridsize: usize, dim: u32) -> Self {
        HexGrid::new(gridsize, (0.0, dim as f64), (0.0, dim as f64))
    }

    /// Hexagon rows in the offset lattice.
    pub fn rows(&self) -> usize {
        self.ny
    }

    /// Hexagon containing `(x, y)`, or `None` when it falls off the grid.
    pub fn cell_for(&self, x: f64, y: f64) -> Option<HexCell> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }

        let ix = (x - self.xmin) / self.sx;
        let iy = (y - self.ymin) / self.sy;

        let ix1 = ix.round_ties_even();
        let iy1 = iy.round_ties_even();
        let ix2 = ix.floor();
        let iy2 = iy.floor();

        let d1 = (ix - ix1).powi(2) + 3.0 * (iy - iy1).powi(2);
        let d2 = (ix - ix2 - 0.5).powi(2) + 3.0 * (iy - iy2 - 0.5).powi(2);

        if d1 < d2 {
            in_range(ix1, iy1, self.nx + 1, self.ny + 1).map(|(col, row)| HexCell {
                lattice: Lattice::Primary,
                col,
                row,
            })
        } else {
            in_range(ix2, iy2, self.nx, self.ny).map(|(col, row)| HexCell {
                lattice: Lattice::Offset,
                col,
                row,
            })
        }
    }

    pub fn center(&self, cell: &HexCell) -> (f64, f64) {
        let shift = match cell.lattice {
            Lattice::Primary => 0.0,
            Lattice::Offset => 0.5,
        };
        (
            self.xmin + (cell.col as f64 + shift) * self.sx,
            self.ymin + (cell.row as f64 + shift) * self.sy,
        )
    }
}

fn in_range(ix: f64, iy: f64, nx: usize, ny: usize) -> Option<(usize, usize)> {
    if ix >= 0.0 && iy >= 0.0 && ix < nx as f64 && iy < ny as f64 {
        Some((ix as usize, iy as usize))
    } else {
        None
    }
}
