//! Geographic to map-image pixel projection.
//!
//! The static map is centered on the mean sample position. Its zoom is the
//! coarsest level whose field of view still covers the sample extent, and
//! pixel coordinates follow a local equirectangular projection around the
//! center with image rows increasing southward.

use serde::Serialize;

use crate::error::{HexrunsError, Result};
use crate::sampler::Sample;

/// Number of axis ticks per side.
pub const TICK_COUNT: usize = 5;

/// A sample in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedSample {
    pub x: f64,
    pub y: f64,
    pub duration_seconds: f64,
    pub speed_mph: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: i32,
    pub dim: u32,
    /// Pixels per degree of longitude
    pub lon_scale: f64,
    /// Pixels per degree of latitude
    pub lat_scale: f64,
}

/// One labelled tick on an axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub pixel: f64,
    pub degrees: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTicks {
    pub decimals: usize,
    pub x: Vec<Tick>,
    pub y: Vec<Tick>,
}

impl Projection {
    /// Fit a projection to the samples for a `dim`×`dim` image.
    pub fn fit(samples: &[Sample], dim: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(HexrunsError::EmptyDataset(
                "no samples to center the map on".into(),
            ));
        }

        let n = samples.len() as f64;
        let center_lat = samples.iter().map(|s| s.latitude).sum::<f64>() / n;
        let center_lon = samples.iter().map(|s| s.longitude).sum::<f64>() / n;
        let scale_factor = 1.0 / center_lat.to_radians().cos();

        let (lat_min, lat_max) = min_max(samples.iter().map(|s| s.latitude));
        let (lon_min, lon_max) = min_max(samples.iter().map(|s| s.longitude));
        let max_range = (scale_factor * (lat_max - lat_min)).max(lon_max - lon_min);
        if !(max_range > 0.0) || !max_range.is_finite() {
            return Err(HexrunsError::DegenerateExtent);
        }

        let zoom = ((360.0 / max_range).log2() + 1.0).floor() as i32;
        Ok(Self::with_zoom(center_lat, center_lon, zoom, dim))
    }

    pub fn with_zoom(center_lat: f64, center_lon: f64, zoom: i32, dim: u32) -> Self {
        let scale_factor = 1.0 / center_lat.to_radians().cos();
        let lon_scale = (dim as f64 / 360.0) * 2f64.powi(zoom - 1);
        Projection {
            center_lat,
            center_lon,
            zoom,
            dim,
            lon_scale,
            lat_scale: lon_scale * scale_factor,
        }
    }

    fn half_dim(&self) -> f64 {
        self.dim as f64 / 2.0
    }

    pub fn lon_to_x(&self, lon: f64) -> f64 {
        self.lon_scale * (lon - self.center_lon) + self.half_dim()
    }

    pub fn lat_to_y(&self, lat: f64) -> f64 {
        -self.lat_scale * (lat - self.center_lat) + self.half_dim()
    }

    /// `(lat, lon)` to `(x, y)` pixels.
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        (self.lon_to_x(lon), self.lat_to_y(lat))
    }

    pub fn x_to_lon(&self, x: f64) -> f64 {
        (x - self.half_dim()) / self.lon_scale + self.center_lon
    }

    pub fn y_to_lat(&self, y: f64) -> f64 {
        (self.half_dim() - y) / self.lat_scale + self.center_lat
    }

    /// `(x, y)` pixels back to `(lat, lon)`.
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        (self.y_to_lat(y), self.x_to_lon(x))
    }

    pub fn project_samples(&self, samples: &[Sample]) -> Vec<ProjectedSample> {
        samples
            .iter()
            .map(|s| {
                let (x, y) = self.project(s.latitude, s.longitude);
                ProjectedSample {
                    x,
                    y,
                    duration_seconds: s.duration_seconds,
                    speed_mph: s.speed_mph,
                }
            })
            .collect()
    }

    pub fn project_paths(&self, paths: &[Vec<(f64, f64)>]) -> Vec<Vec<(f64, f64)>> {
        paths
            .iter()
            .map(|path| path.iter().map(|&(lat, lon)| self.project(lat, lon)).collect())
            .collect()
    }

    /// Label precision: 3 decimals once a fifth of the image spans under 0.01°.
    pub fn tick_decimals(&self) -> usize {
        if (self.dim as f64 / self.lon_scale) / (TICK_COUNT as f64) < 0.01 {
            3
        } else {
            2
        }
    }

    /// Evenly spaced ticks across the image, labelled in degrees.
    pub fn axis_ticks(&self) -> AxisTicks {
        let decimals = self.tick_decimals();
        let dim = self.dim as f64;
        let half = self.half_dim();

        let pixels = linspace(0.0, dim, TICK_COUNT);
        let lons = linspace(
            -half / self.lon_scale + self.center_lon,
            half / self.lon_scale + self.center_lon,
            TICK_COUNT,
        );
        let lats = linspace(
            half / self.lat_scale + self.center_lat,
            -half / self.lat_scale + self.center_lat,
            TICK_COUNT,
        );

        let make = |degrees: &[f64]| -> Vec<Tick> {
            pixels
                .iter()
                .zip(degrees)
                .map(|(&pixel, &degrees)| Tick {
                    pixel,
                    degrees,
                    label: format!("{:.*}", decimals, degrees),
                })
                .collect()
        };

        AxisTicks {
            decimals,
            x: make(&lons),
            y: make(&lats),
        }
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }
    let step = (end - start) / (count - 1) as f64;
    (0..count)
        .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
        .collect()
}
