use geo::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::sampler::Sample;

/// Geographic rectangle used to limit the analysis to one locality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Build from south-west and north-east corners.
    pub fn from_corners(southwest: (f64, f64), northeast: (f64, f64)) -> Self {
        BoundingBox {
            lat_min: southwest.0,
            lat_max: northeast.0,
            lon_min: southwest.1,
            lon_max: northeast.1,
        }
    }

    pub fn as_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.lon_min, y: self.lat_min },
            coord! { x: self.lon_max, y: self.lat_max },
        )
    }

    /// Strict containment: points on the edge are outside.
    pub fn strictly_contains(&self, lat: f64, lon: f64) -> bool {
        let rect = self.as_rect();
        rect.min().y < lat && lat < rect.max().y && rect.min().x < lon && lon < rect.max().x
    }
}

/// Keep the samples strictly inside `bounds`, in their original order.
pub fn filter_samples(samples: Vec<Sample>, bounds: Option<&BoundingBox>) -> Vec<Sample> {
    match bounds {
        Some(bounds) => samples
            .into_iter()
            .filter(|s| bounds.strictly_contains(s.latitude, s.longitude))
            .collect(),
        None => samples,
    }
}
