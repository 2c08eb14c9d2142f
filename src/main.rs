use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{debug, info};

mod aggregate;
mod bounds;
mod cache;
mod config;
mod entropy;
mod error;
mod geocode;
mod hexgrid;
mod http;
mod projection;
mod render;
mod sampler;
mod static_map;
mod summary;
mod track_loader;

use aggregate::{aggregate, HexLayer};
use cache::{DirCache, JsonFileCache, KeyValueCache};
use config::{HexrunsConfig, MapType};
use error::HexrunsError;
use hexgrid::HexGrid;
use http::{Fetch, HttpFetcher};
use projection::Projection;
use render::{Plot, RenderStyle};
use sampler::SegmentSampler;
use static_map::MapRequest;
use summary::RunSummary;

const GEOCODE_CACHE_FILE: &str = "geocode_cache.json";
const ENTROPY_PLOT_SIZE: (u32, u32) = (640, 480);

/// Visualize GPX running data.
#[derive(Debug, Parser)]
#[command(name = "hexruns", version, about)]
struct Args {
    /// Limit visualization to selected locality
    locality: Option<String>,

    /// Minimum time-delta for durations (seconds)
    #[arg(long, default_value_t = 12.0)]
    delta: f64,

    /// Suspicious speed (miles per hour)
    #[arg(long, default_value_t = 15.0)]
    suspicious: f64,

    /// Output filename stem
    #[arg(long, default_value = "hexruns_out")]
    output: String,

    /// Grid size, in number of hexagons
    #[arg(long, default_value_t = 20)]
    grid: usize,

    /// Choose maximum entropy grid size, range 5 to grid
    #[arg(long)]
    entropy: bool,

    /// Duration bins to use for entropy
    #[arg(long, default_value_t = 5)]
    bins: usize,

    /// Opacity of histogram
    #[arg(long, default_value_t = 0.5)]
    alpha: f64,

    /// Map style
    #[arg(long, value_enum, default_value_t = MapType::Roadmap)]
    maptype: MapType,

    /// Generate movie frames for the range of grid sizes
    #[arg(long)]
    movie: bool,

    /// Directory scanned for GPX files
    #[arg(long, default_value = ".")]
    input_dir: PathBuf,

    /// Directory for cached geocodes and map images
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Map image size in pixels
    #[arg(long, default_value_t = 512)]
    dim: u32,

    /// File holding the Google API key
    #[arg(long, default_value = "google_public_api_key")]
    api_key_file: PathBuf,
}

impl From<Args> for HexrunsConfig {
    fn from(args: Args) -> Self {
        HexrunsConfig {
            locality: args.locality,
            min_delta_seconds: args.delta,
            suspicious_speed_mph: args.suspicious,
            output_stem: args.output,
            grid_size: args.grid,
            entropy: args.entropy,
            entropy_bins: args.bins,
            alpha: args.alpha,
            map_type: args.maptype,
            movie: args.movie,
            input_dir: args.input_dir,
            cache_dir: args.cache_dir,
            dim: args.dim,
            api_key_file: args.api_key_file,
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let config = HexrunsConfig::from(Args::parse());
    config.validate()?;
    run(&config)
}

fn init_logger() {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
}

fn run(config: &HexrunsConfig) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new()?;
    let api_key = geocode::load_api_key(&config.api_key_file);
    let mut image_cache = DirCache::open(&config.cache_dir)
        .with_context(|| format!("opening cache {}", config.cache_dir.display()))?;
    let geocode_path = config.cache_dir.join(GEOCODE_CACHE_FILE);
    let mut geocode_cache = JsonFileCache::open(&geocode_path)
        .with_context(|| format!("opening cache {}", geocode_path.display()))?;
    debug!("Geocode cache holds {} places", geocode_cache.len());

    let services = Services {
        fetcher: &fetcher,
        image_cache: &mut image_cache,
        geocode_cache: &mut geocode_cache,
        api_key: api_key.as_deref(),
    };
    let run_summary = process(config, services)?;
    summary::print_summary(&run_summary);
    Ok(())
}

/// Network and cache collaborators of a run.
struct Services<'a> {
    fetcher: &'a dyn Fetch,
    image_cache: &'a mut dyn KeyValueCache,
    geocode_cache: &'a mut dyn KeyValueCache,
    api_key: Option<&'a str>,
}

/// Run the whole pipeline, writing every output next to the configured stem.
fn process(config: &HexrunsConfig, services: Services<'_>) -> error::Result<RunSummary> {
    let bounds = match &config.locality {
        Some(locality) => {
            info!("Limiting to \"{}\"", locality);
            Some(geocode::lookup_bounds(
                locality,
                services.geocode_cache,
                services.fetcher,
                services.api_key,
            )?)
        }
        None => None,
    };

    let files = track_loader::find_gpx_files(&config.input_dir)?;
    let segments = track_loader::load_files(&files)?;

    let sampler = SegmentSampler::new(config.min_delta_seconds, config.suspicious_speed_mph);
    let sampled = sampler.sample_segments(&segments);
    let samples_total = sampled.samples.len();
    info!(
        "{} samples from {} segments, {} suspicious speeds skipped",
        samples_total,
        segments.len(),
        sampled.suspicious.len()
    );

    let samples = bounds::filter_samples(sampled.samples, bounds.as_ref());
    if samples.is_empty() {
        let reason = if bounds.is_some() {
            "no samples inside the locality"
        } else {
            "no samples in the input tracks"
        };
        return Err(HexrunsError::EmptyDataset(reason.into()));
    }

    let projection = Projection::fit(&samples, config.dim)?;
    info!(
        "Map center ({}, {}), zoom {}",
        projection.center_lat, projection.center_lon, projection.zoom
    );
    let projected = projection.project_samples(&samples);
    let paths = projection.project_paths(&sampled.paths);
    let ticks = projection.axis_ticks();

    let request = MapRequest::for_projection(&projection, config.map_type);
    let map = static_map::fetch_map_image(
        &request,
        services.image_cache,
        services.fetcher,
        services.api_key,
    )?;
    let base = render::base_canvas(&map, config.dim);

    let grid_size = if config.entropy {
        let selection = entropy::select_grid_size(
            &projected,
            config.dim,
            config.grid_size,
            config.entropy_bins,
        )?;
        summary::write_entropy_csv(&selection, &config.output_path("_entropy.csv"))?;
        let (width, height) = ENTROPY_PLOT_SIZE;
        render::save_png(
            &render::render_entropy_curve(&selection, width, height),
            &config.output_path("_entropy.png"),
        )?;
        selection.chosen.grid_size
    } else {
        config.grid_size
    };

    let style = RenderStyle {
        alpha: config.alpha,
        ..Default::default()
    };
    let grid = HexGrid::square(grid_size, config.dim);
    let duration = aggregate(&projected, grid, HexLayer::Duration);
    let pace = aggregate(&projected, grid, HexLayer::Pace);

    for (plot, suffix) in [
        (Plot::Paths(&paths), "_paths.png"),
        (Plot::Duration(&duration), "_duration.png"),
        (Plot::Pace(&pace), "_pace.png"),
    ] {
        let mut img = render::render(&base, plot, &style);
        render::decorate(&mut img, plot, &ticks);
        render::save_png(&img, &config.output_path(suffix))?;
    }
    summary::write_cells_csv(&duration, &projection, &config.output_path("_duration_cells.csv"))?;
    summary::write_cells_csv(&pace, &projection, &config.output_path("_pace_cells.csv"))?;
    if !sampled.suspicious.is_empty() {
        summary::write_suspicious_csv(&sampled.suspicious, &config.output_path("_suspicious.csv"))?;
    }

    if config.movie {
        render::write_movie_frames(
            &base,
            &projected,
            config.dim,
            grid_size,
            &style,
            &ticks,
            &config.output_path("_frames"),
        )?;
    }

    let run_summary = RunSummary {
        locality: config.locality.clone(),
        bounds,
        files: files.len(),
        segments: segments.len(),
        samples_total,
        samples_in_bounds: samples.len(),
        suspicious_speeds: sampled.suspicious.len(),
        total_seconds: samples.iter().map(|s| s.duration_seconds).sum(),
        ticks,
        projection,
        grid_size,
        entropy_chosen: config.entropy,
        duration_range: duration.value_range(),
        pace_range: pace.value_range(),
    };
    summary::write_summary_json(&run_summary, &config.output_path("_summary.json"))?;
    Ok(run_summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::http::tests::StubFetcher;
    use crate::track_loader::tests::gpx_document;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::fs;
    use std::io::Cursor;

    fn map_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(16, 16, Rgba([230, 230, 220, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    /// Two runs around Fresh Pond, 30 seconds between points.
    fn write_runs(dir: &std::path::Path) {
        let times = [
            "2021-05-01T07:00:00Z",
            "2021-05-01T07:00:30Z",
            "2021-05-01T07:01:00Z",
            "2021-05-01T07:01:30Z",
            "2021-05-01T07:02:00Z",
        ];
        let first: Vec<(f64, f64, &str)> = (0..5)
            .map(|i| (42.380 + 0.001 * i as f64, -71.150, times[i]))
            .collect();
        let second: Vec<(f64, f64, &str)> = (0..5)
            .map(|i| (42.384, -71.150 + 0.001 * i as f64, times[i]))
            .collect();
        fs::write(dir.join("morning.gpx"), gpx_document(&[&[first.as_slice()]])).unwrap();
        fs::write(dir.join("evening.gpx"), gpx_document(&[&[second.as_slice()]])).unwrap();
    }

    fn config_for(input: &std::path::Path, out: &std::path::Path) -> HexrunsConfig {
        HexrunsConfig {
            input_dir: input.to_path_buf(),
            output_stem: out.join("run").to_string_lossy().to_string(),
            dim: 64,
            grid_size: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_process_writes_every_output() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_runs(input.path());
        let config = HexrunsConfig {
            entropy: true,
            movie: true,
            ..config_for(input.path(), out.path())
        };

        let fetcher = StubFetcher::new(map_png());
        let mut image_cache = MemoryCache::default();
        let mut geocode_cache = MemoryCache::default();
        let services = Services {
            fetcher: &fetcher,
            image_cache: &mut image_cache,
            geocode_cache: &mut geocode_cache,
            api_key: Some("k"),
        };
        let summary = process(&config, services).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.segments, 2);
        assert_eq!(summary.samples_total, 8);
        assert_eq!(summary.suspicious_speeds, 0);
        assert!((5..=8).contains(&summary.grid_size));
        assert_eq!(fetcher.requests.borrow().len(), 1);
        assert_eq!(image_cache.entries.len(), 1);

        for suffix in [
            "_paths.png",
            "_duration.png",
            "_pace.png",
            "_duration_cells.csv",
            "_pace_cells.csv",
            "_entropy.csv",
            "_entropy.png",
            "_summary.json",
        ] {
            assert!(config.output_path(suffix).exists(), "missing {}", suffix);
        }
        assert!(!config.output_path("_suspicious.csv").exists());
        let paths = image::open(config.output_path("_paths.png")).unwrap();
        assert_eq!((paths.width(), paths.height()), (64, 64));

        // The movie sweeps from the chosen grid size, not the configured one
        let frames = fs::read_dir(config.output_path("_frames")).unwrap().count();
        assert_eq!(frames, render::movie_grid_sizes(summary.grid_size).len());
        assert_eq!(frames, summary.grid_size - 1);
    }

    #[test]
    fn test_locality_excluding_every_sample_is_empty_dataset() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_runs(input.path());
        let config = HexrunsConfig {
            locality: Some("Provincetown".into()),
            ..config_for(input.path(), out.path())
        };

        let fetcher = StubFetcher::new(map_png());
        let mut image_cache = MemoryCache::default();
        let mut geocode_cache = MemoryCache::default();
        geocode_cache
            .put(
                "Provincetown",
                br#"{"bounds": {"southwest": {"lat": 42.03, "lng": -70.25},
                                "northeast": {"lat": 42.08, "lng": -70.15}}}"#,
            )
            .unwrap();
        let services = Services {
            fetcher: &fetcher,
            image_cache: &mut image_cache,
            geocode_cache: &mut geocode_cache,
            api_key: None,
        };

        let result = process(&config, services);
        assert!(matches!(result, Err(HexrunsError::EmptyDataset(_))));
        assert!(fetcher.requests.borrow().is_empty());
        assert!(!config.output_path("_paths.png").exists());
    }

    #[test]
    fn test_empty_input_directory_is_empty_dataset() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let config = config_for(input.path(), out.path());

        let fetcher = StubFetcher::new(map_png());
        let mut image_cache = MemoryCache::default();
        let mut geocode_cache = MemoryCache::default();
        let services = Services {
            fetcher: &fetcher,
            image_cache: &mut image_cache,
            geocode_cache: &mut geocode_cache,
            api_key: None,
        };
        assert!(matches!(
            process(&config, services),
            Err(HexrunsError::EmptyDataset(_))
        ));
    }
}
