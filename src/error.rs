use std::path::PathBuf;

/// Errors that abort a hexruns run.
#[derive(Debug, thiserror::Error)]
pub enum HexrunsError {
    /// A track file could not be read as GPX.
    #[error("Could not parse {path}: {message}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// All samples sit on one coordinate, so no zoom level can be derived.
    #[error("Sample extent is zero; cannot choose a zoom level")]
    DegenerateExtent,

    /// Nothing left to aggregate.
    #[error("No samples to aggregate: {0}")]
    EmptyDataset(String),

    /// The geocoding service returned nothing usable.
    #[error("Geocode lookup for \"{place}\" failed: {message}")]
    Lookup {
        /// Place name that was looked up.
        place: String,
        /// What went wrong.
        message: String,
    },

    /// HTTP request failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Cached content could not be interpreted.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Options that cannot be used together or are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HexrunsError>;
