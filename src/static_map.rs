/// Static background map from the Google Static Maps API
///
/// Images are cached under the percent-encoded request URL. The API key is
/// appended only when fetching, so cached images survive key rotation.
use image::DynamicImage;
use log::{info, warn};

use crate::cache::KeyValueCache;
use crate::config::MapType;
use crate::error::Result;
use crate::http::Fetch;
use crate::projection::Projection;

const STATIC_MAP_URL: &str = "http://maps.googleapis.com/maps/api/staticmap";

#[derive(Debug, Clone, PartialEq)]
pub struct MapRequest {
    pub map_type: MapType,
    pub center_lat: f64,
    pub center_lon: f64,
    pub dim: u32,
    pub zoom: i32,
}

impl MapRequest {
    pub fn for_projection(projection: &Projection, map_type: MapType) -> Self {
        MapRequest {
            map_type,
            center_lat: projection.center_lat,
            center_lon: projection.center_lon,
            dim: projection.dim,
            zoom: projection.zoom,
        }
    }

    /// Request URL without credentials; doubles as the cache key.
    pub fn url(&self) -> String {
        format!(
            "{}?maptype={}&center={},{}&size={}x{}&zoom={}",
            STATIC_MAP_URL, self.map_type, self.center_lat, self.center_lon, self.dim, self.dim, self.zoom
        )
    }
}

/// Fetch (or load from cache) and decode the map image for `request`.
pub fn fetch_map_image(
    request: &MapRequest,
    cache: &mut dyn KeyValueCache,
    fetcher: &dyn Fetch,
    api_key: Option<&str>,
) -> Result<DynamicImage> {
    let key = request.url();

    if let Some(bytes) = cache.get(&key)? {
        match image::load_from_memory(&bytes) {
            Ok(img) => {
                info!("Using cached map image (zoom {})", request.zoom);
                return Ok(img);
            }
            Err(e) => {
                // Corrupted cache entry, fetch again and overwrite it
                warn!("Cached map image unreadable ({}), refetching", e);
            }
        }
    }

    let url = match api_key {
        Some(k) => format!("{}&key={}", key, k),
        None => key.clone(),
    };
    info!("Fetching map image (zoom {})", request.zoom);
    let bytes = fetcher.fetch(&url)?;
    let img = image::load_from_memory(&bytes)?;
    cache.put(&key, &bytes)?;
    Ok(img)
}
