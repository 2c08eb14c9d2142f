/// Run configuration for hexruns
///
/// Every knob of a run lives here. `main` builds one from the command line,
/// tests build one from `Default` and override what they need.
use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

use crate::error::{HexrunsError, Result};

/// Smallest grid size the entropy search starts from.
pub const MIN_ENTROPY_GRID: usize = 5;

/// Google static map styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MapType {
    #[default]
    Roadmap,
    Satellite,
    Hybrid,
    Terrain,
}

impl MapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Roadmap => "roadmap",
            MapType::Satellite => "satellite",
            MapType::Hybrid => "hybrid",
            MapType::Terrain => "terrain",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HexrunsConfig {
    /// Limit to a geocoded place
    pub locality: Option<String>,
    /// Minimum seconds between the reference point and a candidate point
    pub min_delta_seconds: f64,
    /// Pairs faster than this (mph) are treated as sensor glitches
    pub suspicious_speed_mph: f64,
    /// Stem for every output file name
    pub output_stem: String,
    /// Hexagons across the horizontal extent
    pub grid_size: usize,
    /// Pick the max-entropy grid size in `MIN_ENTROPY_GRID..=grid_size`
    pub entropy: bool,
    /// Histogram buckets for the entropy measure
    pub entropy_bins: usize,
    /// Overlay opacity (0..=1)
    pub alpha: f64,
    pub map_type: MapType,
    /// Write a frame sequence sweeping the grid size
    pub movie: bool,
    pub input_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Width and height of the map image in pixels
    pub dim: u32,
    pub api_key_file: PathBuf,
}

impl Default for HexrunsConfig {
    fn default() -> Self {
        HexrunsConfig {
            locality: None,
            min_delta_seconds: 12.0,
            suspicious_speed_mph: 15.0,
            output_stem: "hexruns_out".to_string(),
            grid_size: 20,
            entropy: false,
            entropy_bins: 5,
            alpha: 0.5,
            map_type: MapType::Roadmap,
            movie: false,
            input_dir: PathBuf::from("."),
            cache_dir: PathBuf::from("cache"),
            dim: 512,
            api_key_file: PathBuf::from("google_public_api_key"),
        }
    }
}

impl HexrunsConfig {
    /// Reject option values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_delta_seconds > 0.0) {
            return Err(HexrunsError::InvalidConfig(format!(
                "delta must be positive, got {}",
                self.min_delta_seconds
            )));
        }
        if !(self.suspicious_speed_mph > 0.0) {
            return Err(HexrunsError::InvalidConfig(format!(
                "suspicious speed must be positive, got {}",
                self.suspicious_speed_mph
            )));
        }
        if self.grid_size == 0 {
            return Err(HexrunsError::InvalidConfig("grid size must be at least 1".into()));
        }
        if self.entropy && self.grid_size < MIN_ENTROPY_GRID {
            return Err(HexrunsError::InvalidConfig(format!(
                "entropy search needs a grid size of at least {}, got {}",
                MIN_ENTROPY_GRID, self.grid_size
            )));
        }
        if self.entropy_bins == 0 {
            return Err(HexrunsError::InvalidConfig("entropy bins must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(HexrunsError::InvalidConfig(format!(
                "alpha must be within 0..=1, got {}",
                self.alpha
            )));
        }
        if self.dim == 0 {
            return Err(HexrunsError::InvalidConfig("image dimension must be positive".into()));
        }
        if self.output_stem.trim().is_empty() {
            return Err(HexrunsError::InvalidConfig("output stem is empty".into()));
        }
        Ok(())
    }

    pub fn output_path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.output_stem, suffix))
    }
}
