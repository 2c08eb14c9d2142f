//! Raster output: hexbin heatmaps and track paths over the static map.
//!
//! Every output image is the map, resized to the projection's pixel extent if
//! needed, with one plot composited on top. Hexagons are filled by asking the
//! grid which cell each pixel center falls in, so the fill uses the exact
//! same tiling the samples were binned with.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use log::{debug, info};

use crate::aggregate::{aggregate, HexAggregate, HexLayer};
use crate::entropy::EntropySelection;
use crate::error::Result;
use crate::hexgrid::HexGrid;
use crate::projection::{AxisTicks, ProjectedSample};

/// Smallest grid size in a movie sweep.
const MOVIE_MIN_GRID: usize = 3;

/// What to draw over the map.
#[derive(Debug, Clone, Copy)]
pub enum Plot<'a> {
    /// Total seconds per hexagon
    Duration(&'a HexAggregate),
    /// Fastest min/mile per hexagon
    Pace(&'a HexAggregate),
    /// Projected polylines, one per segment
    Paths(&'a [Vec<(f64, f64)>]),
}

impl Plot<'_> {
    pub fn title(&self) -> &'static str {
        match self {
            Plot::Duration(_) => HexLayer::Duration.title(),
            Plot::Pace(_) => HexLayer::Pace.title(),
            Plot::Paths(_) => "Paths",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    /// Overlay opacity
    pub alpha: f64,
    pub path_width: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        RenderStyle {
            alpha: 0.5,
            path_width: 1.5,
        }
    }
}

/// Piecewise-linear colour ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Light to dark blue
    Blues,
    /// Dark to light red, so the smallest value is the most intense
    RedsReversed,
}

const BLUES: [[u8; 3]; 3] = [[247, 251, 255], [107, 174, 214], [8, 48, 107]];
const REDS: [[u8; 3]; 3] = [[255, 245, 240], [251, 106, 74], [103, 0, 13]];

// Line colours for successive paths
const PATH_CYCLE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

impl Colormap {
    pub fn for_layer(layer: HexLayer) -> Self {
        match layer {
            HexLayer::Duration => Colormap::Blues,
            HexLayer::Pace => Colormap::RedsReversed,
        }
    }

    /// Colour at `t` in `0..=1`.
    pub fn sample(&self, t: f64) -> [u8; 3] {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let (stops, t) = match self {
            Colormap::Blues => (&BLUES, t),
            Colormap::RedsReversed => (&REDS, 1.0 - t),
        };

        let scaled = t * (stops.len() - 1) as f64;
        let i = (scaled.floor() as usize).min(stops.len() - 2);
        let frac = scaled - i as f64;
        let mut out = [0u8; 3];
        for c in 0..3 {
            let a = stops[i][c] as f64;
            let b = stops[i + 1][c] as f64;
            out[c] = (a + (b - a) * frac).round() as u8;
        }
        out
    }
}

/// Map background at `dim`×`dim`.
pub fn base_canvas(map: &DynamicImage, dim: u32) -> RgbaImage {
    let rgba = map.to_rgba8();
    if rgba.width() == dim && rgba.height() == dim {
        rgba
    } else {
        debug!(
            "Resizing map image from {}x{} to {}x{}",
            rgba.width(),
            rgba.height(),
            dim,
            dim
        );
        imageops::resize(&rgba, dim, dim, FilterType::Triangle)
    }
}

/// Composite `plot` onto a copy of `base`.
pub fn render(base: &RgbaImage, plot: Plot<'_>, style: &RenderStyle) -> RgbaImage {
    debug!("Rendering \"{}\"", plot.title());
    let mut img = base.clone();
    match plot {
        Plot::Duration(agg) | Plot::Pace(agg) => fill_hexagons(&mut img, agg, style.alpha),
        Plot::Paths(paths) => {
            for (i, path) in paths.iter().enumerate() {
                let [r, g, b] = PATH_CYCLE[i % PATH_CYCLE.len()];
                let color = [r, g, b, 255];
                for pair in path.windows(2) {
                    draw_line_aa(
                        &mut img,
                        pair[0].0 as f32,
                        pair[0].1 as f32,
                        pair[1].0 as f32,
                        pair[1].1 as f32,
                        color,
                        style.path_width,
                    );
                }
            }
        }
    }
    img
}

fn fill_hexagons(img: &mut RgbaImage, agg: &HexAggregate, alpha: f64) {
    let Some((lo, hi)) = agg.value_range() else {
        return;
    };
    let colormap = Colormap::for_layer(agg.layer);
    let span = hi - lo;
    let alpha = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let Some(cell) = agg.grid.cell_for(x as f64 + 0.5, y as f64 + 0.5) else {
            continue;
        };
        let Some(value) = agg.get(&cell) else {
            continue;
        };
        // A stationary cell has infinite pace, the slow end of the scale
        let t = if !value.is_finite() {
            1.0
        } else if span > 0.0 {
            (value - lo) / span
        } else {
            0.5
        };
        let [r, g, b] = colormap.sample(t);
        blend(pixel, [r, g, b, alpha], 1.0);
    }
}

const INK: [u8; 4] = [40, 40, 40, 255];
const TICK_LENGTH: f32 = 6.0;

/// Tick marks on all four edges at the axis tick pixels, plus a colour scale
/// strip along the right edge for heatmaps.
pub fn decorate(img: &mut RgbaImage, plot: Plot<'_>, ticks: &AxisTicks) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let clamp_edge = |pixel: f64, extent: f32| (pixel as f32).min(extent - 1.0).max(0.0);

    for tick in &ticks.x {
        let x = clamp_edge(tick.pixel, w);
        draw_line_wu(img, x, 0.0, x, TICK_LENGTH, INK);
        draw_line_wu(img, x, h - 1.0 - TICK_LENGTH, x, h - 1.0, INK);
    }
    for tick in &ticks.y {
        let y = clamp_edge(tick.pixel, h);
        draw_line_wu(img, 0.0, y, TICK_LENGTH, y, INK);
        draw_line_wu(img, w - 1.0 - TICK_LENGTH, y, w - 1.0, y, INK);
    }

    if let Plot::Duration(agg) | Plot::Pace(agg) = plot {
        draw_colour_scale(img, Colormap::for_layer(agg.layer));
    }
}

/// Vertical ramp with the high end of the scale on top.
fn draw_colour_scale(img: &mut RgbaImage, colormap: Colormap) {
    let (w, h) = (img.width(), img.height());
    let strip = (w / 32).max(2);
    let right = w.saturating_sub(TICK_LENGTH as u32 + 3);
    let left = right.saturating_sub(strip);
    let top = h / 10;
    let bottom = h - h / 10;
    if bottom <= top + 1 || left == right {
        return;
    }

    for y in top..bottom {
        let t = (bottom - 1 - y) as f64 / (bottom - 1 - top) as f64;
        let [r, g, b] = colormap.sample(t);
        for x in left..right {
            img.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }
}

/// Line chart of entropy against grid size, the chosen size boxed.
pub fn render_entropy_curve(selection: &EntropySelection, width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let curve = &selection.curve;
    let (Some(first), Some(end)) = (curve.first(), curve.last()) else {
        return img;
    };

    let margin = (width.min(height) / 10).max(2) as f64;
    let (lo, hi) = curve.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.entropy_bits), hi.max(p.entropy_bits))
    });
    let x_span = (end.grid_size - first.grid_size).max(1) as f64;
    let y_span = if hi > lo { hi - lo } else { 1.0 };
    let to_pixel = |grid_size: usize, bits: f64| {
        let x = margin + (grid_size - first.grid_size) as f64 / x_span * (width as f64 - 2.0 * margin);
        let y = height as f64 - margin - (bits - lo) / y_span * (height as f64 - 2.0 * margin);
        (x as f32, y as f32)
    };

    // Axes
    let (x0, y0) = (margin as f32, (height as f64 - margin) as f32);
    draw_line_wu(&mut img, x0, y0, (width as f64 - margin) as f32, y0, INK);
    draw_line_wu(&mut img, x0, y0, x0, margin as f32, INK);

    let [r, g, b] = PATH_CYCLE[0];
    for pair in curve.windows(2) {
        let (ax, ay) = to_pixel(pair[0].grid_size, pair[0].entropy_bits);
        let (bx, by) = to_pixel(pair[1].grid_size, pair[1].entropy_bits);
        draw_line_aa(&mut img, ax, ay, bx, by, [r, g, b, 255], 1.5);
    }

    let (cx, cy) = to_pixel(selection.chosen.grid_size, selection.chosen.entropy_bits);
    let [r, g, b] = PATH_CYCLE[3];
    let marker = [r, g, b, 255];
    let d = 3.0;
    draw_line_wu(&mut img, cx - d, cy - d, cx + d, cy - d, marker);
    draw_line_wu(&mut img, cx + d, cy - d, cx + d, cy + d, marker);
    draw_line_wu(&mut img, cx + d, cy + d, cx - d, cy + d, marker);
    draw_line_wu(&mut img, cx - d, cy + d, cx - d, cy - d, marker);
    img
}

/// Porter-Duff "over" of `color` (scaled by `coverage`) onto `pixel`.
#[inline]
fn blend(pixel: &mut Rgba<u8>, color: [u8; 4], coverage: f32) {
    let alpha = (color[3] as f32 * coverage.clamp(0.0, 1.0)) as u8;
    if alpha == 0 {
        return;
    }

    let src_a = alpha as f32 / 255.0;
    let dst_a = pixel[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    if out_a > 0.0 {
        for i in 0..3 {
            let src = color[i] as f32;
            let dst = pixel[i] as f32;
            pixel[i] = ((src * src_a + dst * dst_a * (1.0 - src_a)) / out_a) as u8;
        }
        pixel[3] = (out_a * 255.0) as u8;
    }
}

fn draw_line_aa(img: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, color: [u8; 4], width: f32) {
    if width <= 1.0 {
        draw_line_wu(img, x0, y0, x1, y1, color);
        return;
    }

    let dx = x1 - x0;
    let dy = y1 - y0;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 0.001 {
        return;
    }

    // Parallel strokes across the width
    let px = -dy / len;
    let py = dx / len;
    let steps = (width.ceil() as i32).max(2);
    for i in 0..steps {
        let offset = -width / 2.0 + (i as f32 / (steps - 1) as f32) * width;
        draw_line_wu(img, x0 + px * offset, y0 + py * offset, x1 + px * offset, y1 + py * offset, color);
    }
}

/// Xiaolin Wu's antialiased line.
fn draw_line_wu(img: &mut RgbaImage, mut x0: f32, mut y0: f32, mut x1: f32, mut y1: f32, color: [u8; 4]) {
    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    if steep {
        std::mem::swap(&mut x0, &mut y0);
        std::mem::swap(&mut x1, &mut y1);
    }
    if x0 > x1 {
        std::mem::swap(&mut x0, &mut x1);
        std::mem::swap(&mut y0, &mut y1);
    }

    let dx = x1 - x0;
    let dy = y1 - y0;
    let gradient = if dx.abs() < 0.001 { 1.0 } else { dy / dx };

    let mut plot = |x: i32, y: i32, coverage: f32| {
        let (px, py) = if steep { (y, x) } else { (x, y) };
        if px < 0 || py < 0 || px >= img.width() as i32 || py >= img.height() as i32 {
            return;
        }
        blend(img.get_pixel_mut(px as u32, py as u32), color, coverage);
    };

    let xend = x0.round();
    let yend = y0 + gradient * (xend - x0);
    let xgap = 1.0 - (x0 + 0.5).fract();
    let xpxl1 = xend as i32;
    let ypxl1 = yend.floor() as i32;
    plot(xpxl1, ypxl1, (1.0 - yend.fract()) * xgap);
    plot(xpxl1, ypxl1 + 1, yend.fract() * xgap);
    let mut intery = yend + gradient;

    let xend = x1.round();
    let yend = y1 + gradient * (xend - x1);
    let xgap = (x1 + 0.5).fract();
    let xpxl2 = xend as i32;
    let ypxl2 = yend.floor() as i32;
    plot(xpxl2, ypxl2, (1.0 - yend.fract()) * xgap);
    plot(xpxl2, ypxl2 + 1, yend.fract() * xgap);

    for x in (xpxl1 + 1)..xpxl2 {
        let y = intery.floor() as i32;
        plot(x, y, 1.0 - intery.fract());
        plot(x, y + 1, intery.fract());
        intery += gradient;
    }
}

pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    img.save_with_format(path, image::ImageFormat::Png)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Grid sizes of a movie sweep: `max_grid + 1` down to `MOVIE_MIN_GRID`.
pub fn movie_grid_sizes(max_grid: usize) -> Vec<usize> {
    if max_grid + 1 < MOVIE_MIN_GRID {
        return Vec::new();
    }
    (MOVIE_MIN_GRID..=max_grid + 1).rev().collect()
}

/// Write one duration frame per grid size into `dir`, in sweep order.
pub fn write_movie_frames(
    base: &RgbaImage,
    samples: &[ProjectedSample],
    dim: u32,
    max_grid: usize,
    style: &RenderStyle,
    ticks: &AxisTicks,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut frames = Vec::new();

    for (index, grid_size) in movie_grid_sizes(max_grid).into_iter().enumerate() {
        let agg = aggregate(samples, HexGrid::square(grid_size, dim), HexLayer::Duration);
        let mut frame = render(base, Plot::Duration(&agg), style);
        decorate(&mut frame, Plot::Duration(&agg), ticks);
        let path = dir.join(format!("frame_{:03}.png", index));
        frame.save_with_format(&path, image::ImageFormat::Png)?;
        debug!("Frame {} (grid size {}) -> {}", index, grid_size, path.display());
        frames.push(path);
    }

    info!("Wrote {} movie frames to {}", frames.len(), dir.display());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropyPoint;
    use crate::hexgrid::{HexCell, Lattice};
    use crate::projection::Projection;

    fn blank(dim: u32) -> RgbaImage {
        RgbaImage::from_pixel(dim, dim, Rgba([255, 255, 255, 255]))
    }

    fn samples() -> Vec<ProjectedSample> {
        vec![
            ProjectedSample { x: 20.0, y: 20.0, duration_seconds: 10.0, speed_mph: 5.0 },
            ProjectedSample { x: 100.0, y: 100.0, duration_seconds: 40.0, speed_mph: 8.0 },
        ]
    }

    #[test]
    fn test_colormap_ends() {
        assert_eq!(Colormap::Blues.sample(0.0), BLUES[0]);
        assert_eq!(Colormap::Blues.sample(1.0), BLUES[2]);
        assert_eq!(Colormap::Blues.sample(0.5), BLUES[1]);
        // Reversed ramp puts the darkest red at the low end
        assert_eq!(Colormap::RedsReversed.sample(0.0), REDS[2]);
        assert_eq!(Colormap::RedsReversed.sample(1.0), REDS[0]);
        assert_eq!(Colormap::Blues.sample(f64::NAN), BLUES[0]);
    }

    #[test]
    fn test_hexagons_tint_only_occupied_cells() {
        let dim = 128;
        let agg = aggregate(&samples(), HexGrid::square(4, dim), HexLayer::Duration);
        let img = render(&blank(dim), Plot::Duration(&agg), &RenderStyle::default());

        // Under a sample the map is tinted blue
        let tinted = img.get_pixel(100, 100);
        assert!(tinted[2] > tinted[0]);

        // Far from every sample the map is untouched
        let occupied = |x: u32, y: u32| {
            agg.grid
                .cell_for(x as f64 + 0.5, y as f64 + 0.5)
                .map(|c| agg.cells.contains_key(&c))
                .unwrap_or(false)
        };
        let (x, y) = (0..dim)
            .flat_map(|x| (0..dim).map(move |y| (x, y)))
            .find(|&(x, y)| !occupied(x, y))
            .unwrap();
        assert_eq!(img.get_pixel(x, y), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_stationary_cells_take_the_slow_end_of_the_pace_scale() {
        let dim = 128;
        let grid = HexGrid::square(4, dim);
        let cells = [
            HexCell { lattice: Lattice::Offset, col: 0, row: 0 },
            HexCell { lattice: Lattice::Offset, col: 2, row: 0 },
            HexCell { lattice: Lattice::Offset, col: 1, row: 1 },
        ];
        // Standing still, 10 mph, 6 mph
        let samples: Vec<ProjectedSample> = cells
            .iter()
            .zip([0.0, 10.0, 6.0])
            .map(|(cell, speed_mph)| {
                let (x, y) = grid.center(cell);
                ProjectedSample { x, y, duration_seconds: 15.0, speed_mph }
            })
            .collect();

        let pace = aggregate(&samples, grid, HexLayer::Pace);
        assert_eq!(pace.get(&cells[0]), Some(f64::INFINITY));
        assert_eq!(pace.value_range(), Some((6.0, 10.0)));

        let img = render(&blank(dim), Plot::Pace(&pace), &RenderStyle::default());
        let pixel_at = |cell: &HexCell| {
            let (x, y) = grid.center(cell);
            *img.get_pixel(x as u32, y as u32)
        };
        let stationary = pixel_at(&cells[0]);
        let fastest = pixel_at(&cells[1]);
        let slowest = pixel_at(&cells[2]);
        assert_ne!(stationary, fastest);
        assert_eq!(stationary, slowest);
    }

    #[test]
    fn test_decorate_marks_ticks_and_scale() {
        let dim = 128;
        let ticks = Projection::with_zoom(42.0, -71.0, 14, dim).axis_ticks();
        let agg = aggregate(&samples(), HexGrid::square(4, dim), HexLayer::Duration);
        let mut img = blank(dim);
        decorate(&mut img, Plot::Duration(&agg), &ticks);

        // Middle x tick on the top edge
        assert_ne!(img.get_pixel(64, 2), &Rgba([255, 255, 255, 255]));
        // Scale runs dark at the top to light at the bottom
        let x = dim - TICK_LENGTH as u32 - 4;
        let top = img.get_pixel(x, dim / 10);
        let bottom = img.get_pixel(x, dim - dim / 10 - 1);
        assert_eq!(&top.0[..3], &BLUES[2][..]);
        assert_eq!(&bottom.0[..3], &BLUES[0][..]);

        // Paths get ticks but no scale
        let mut paths_img = blank(dim);
        decorate(&mut paths_img, Plot::Paths(&[]), &ticks);
        assert_eq!(paths_img.get_pixel(x, dim / 2), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_entropy_curve_image() {
        let curve = vec![
            EntropyPoint { grid_size: 5, entropy_bits: 0.5 },
            EntropyPoint { grid_size: 6, entropy_bits: 1.5 },
            EntropyPoint { grid_size: 7, entropy_bits: 1.0 },
        ];
        let selection = EntropySelection { chosen: curve[1], curve };
        let img = render_entropy_curve(&selection, 200, 100);
        assert_eq!(img.dimensions(), (200, 100));
        // The chosen point sits at the top of the plot area, midway across
        let marker = img.get_pixel(103, 7);
        assert_ne!(marker, &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(150, 80), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_paths_are_drawn() {
        let paths = vec![vec![(10.0, 10.0), (60.0, 10.0)]];
        let img = render(&blank(64), Plot::Paths(&paths), &RenderStyle::default());
        assert_ne!(img.get_pixel(30, 10), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(30, 40), &Rgba([255, 255, 255, 255]));
        assert_eq!(Plot::Paths(&paths).title(), "Paths");
    }

    #[test]
    fn test_base_canvas_resizes() {
        let map = DynamicImage::ImageRgba8(blank(32));
        assert_eq!(base_canvas(&map, 64).dimensions(), (64, 64));
        assert_eq!(base_canvas(&map, 32).dimensions(), (32, 32));
    }

    #[test]
    fn test_movie_frames() {
        assert_eq!(movie_grid_sizes(4), vec![5, 4, 3]);
        assert!(movie_grid_sizes(1).is_empty());

        let dir = tempfile::tempdir().unwrap();
        let frames = write_movie_frames(
            &blank(64),
            &samples(),
            64,
            3,
            &RenderStyle::default(),
            &Projection::with_zoom(42.0, -71.0, 14, 64).axis_ticks(),
            &dir.path().join("frames"),
        )
        .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].ends_with("frame_000.png"));
        let first = image::open(&frames[0]).unwrap();
        assert_eq!(first.width(), 64);
    }
}
