/// Locality bounds from the Google Geocoding API
///
/// The `geometry` object of the first result is cached per place name, so a
/// locality is only ever looked up once per cache directory.
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::bounds::BoundingBox;
use crate::cache::{percent_encode, KeyValueCache};
use crate::error::{HexrunsError, Result};
use crate::http::Fetch;

const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLngBounds {
    southwest: LatLng,
    northeast: LatLng,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    bounds: Option<LatLngBounds>,
    viewport: Option<LatLngBounds>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: serde_json::Value,
}

/// API key from `GOOGLE_MAPS_API_KEY`, falling back to the contents of `key_file`.
pub fn load_api_key(key_file: &Path) -> Option<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }
    match fs::read_to_string(key_file) {
        Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            debug!("No API key at {}: {}", key_file.display(), e);
            None
        }
    }
}

/// Bounding box of `place`, from the cache or the geocoding service.
pub fn lookup_bounds(
    place: &str,
    cache: &mut dyn KeyValueCache,
    fetcher: &dyn Fetch,
    api_key: Option<&str>,
) -> Result<BoundingBox> {
    let geometry = match cache.get(place)? {
        Some(raw) => {
            info!("Using cached geocode for \"{}\"", place);
            raw
        }
        None => {
            let raw = fetch_geometry(place, fetcher, api_key)?;
            cache.put(place, &raw)?;
            raw
        }
    };

    let bounds = parse_geometry(place, &geometry)?;
    info!("Latitude:  {} -- {}", bounds.lat_min, bounds.lat_max);
    info!("Longitude: {} -- {}", bounds.lon_min, bounds.lon_max);
    Ok(bounds)
}

fn fetch_geometry(place: &str, fetcher: &dyn Fetch, api_key: Option<&str>) -> Result<Vec<u8>> {
    let lookup_error = |message: String| HexrunsError::Lookup {
        place: place.to_string(),
        message,
    };

    let key = api_key.ok_or_else(|| {
        lookup_error(format!("no API key (set {} or provide a key file)", API_KEY_ENV))
    })?;
    let url = format!(
        "{}?address={}&key={}",
        GEOCODE_URL,
        percent_encode(place),
        percent_encode(key)
    );

    let body = fetcher.fetch(&url)?;
    let response: GeocodeResponse = serde_json::from_slice(&body)
        .map_err(|e| lookup_error(format!("unreadable response: {}", e)))?;

    if response.status != "OK" {
        let detail = response.error_message.unwrap_or_default();
        return Err(lookup_error(format!("status {} {}", response.status, detail).trim().to_string()));
    }

    let first = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| lookup_error("no results".into()))?;
    Ok(serde_json::to_vec(&first.geometry)?)
}

fn parse_geometry(place: &str, raw: &[u8]) -> Result<BoundingBox> {
    let lookup_error = |message: String| HexrunsError::Lookup {
        place: place.to_string(),
        message,
    };

    let geometry: Geometry = serde_json::from_slice(raw)
        .map_err(|e| lookup_error(format!("unreadable geometry: {}", e)))?;

    let bounds = match (geometry.bounds, geometry.viewport) {
        (Some(bounds), _) => bounds,
        (None, Some(viewport)) => {
            warn!("\"{}\" has no bounds, using its viewport", place);
            viewport
        }
        (None, None) => return Err(lookup_error("result has no bounds".into())),
    };

    Ok(BoundingBox::from_corners(
        (bounds.southwest.lat, bounds.southwest.lng),
        (bounds.northeast.lat, bounds.northeast.lng),
    ))
}
