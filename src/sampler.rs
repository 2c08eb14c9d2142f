/// Segment sampling
///
/// Walks a segment keeping a reference point and emits one motion sample per
/// accepted pair. A pair is rejected when too little time has elapsed (sensor
/// jitter) or when the implied speed is implausible for running (GPS glitch).
/// In both cases the reference point stays where it is, so the next candidate
/// is measured against the last accepted point.
use log::{debug, warn};

use crate::track_loader::{Segment, TrackPoint};

/// Earth's circumference in miles.
const EARTH_CIRCUMFERENCE_MI: f64 = 24901.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    pub duration_seconds: f64,
    pub speed_mph: f64,
}

/// A pair skipped for implying an implausible speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspiciousSpeed {
    pub last: TrackPoint,
    pub new: TrackPoint,
    pub speed_mph: f64,
}

/// Everything derived from one or more segments.
#[derive(Debug, Clone, Default)]
pub struct SampledTracks {
    pub samples: Vec<Sample>,
    /// One (lat, lon) polyline per segment, unfiltered
    pub paths: Vec<Vec<(f64, f64)>>,
    pub suspicious: Vec<SuspiciousSpeed>,
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentSampler {
    pub min_delta_seconds: f64,
    pub max_speed_mph: f64,
}

impl Default for SegmentSampler {
    fn default() -> Self {
        SegmentSampler {
            min_delta_seconds: 12.0,
            max_speed_mph: 15.0,
        }
    }
}

impl SegmentSampler {
    pub fn new(min_delta_seconds: f64, max_speed_mph: f64) -> Self {
        SegmentSampler {
            min_delta_seconds,
            max_speed_mph,
        }
    }

    /// Sample a single segment's points.
    pub fn sample_points(&self, points: &[TrackPoint]) -> SampledTracks {
        let mut out = SampledTracks::default();
        let Some((first, rest)) = points.split_first() else {
            return out;
        };

        let mut path = Vec::with_capacity(points.len());
        path.push((first.latitude, first.longitude));

        let mut last = *first;
        for new in rest {
            path.push((new.latitude, new.longitude));

            let t = elapsed_seconds(&last, new);
            if t < self.min_delta_seconds {
                continue;
            }

            let speed_mph = 3600.0 * equirectangular_miles(&last, new) / t;
            if speed_mph > self.max_speed_mph {
                warn!(
                    "Suspicious speed: {:.2} mph between ({:.6}, {:.6}) @ {} and ({:.6}, {:.6}) @ {}",
                    speed_mph,
                    last.latitude,
                    last.longitude,
                    last.timestamp,
                    new.latitude,
                    new.longitude,
                    new.timestamp
                );
                out.suspicious.push(SuspiciousSpeed {
                    last,
                    new: *new,
                    speed_mph,
                });
                continue;
            }

            out.samples.push(Sample {
                latitude: new.latitude,
                longitude: new.longitude,
                duration_seconds: t,
                speed_mph,
            });
            last = *new;
        }

        out.paths.push(path);
        out
    }

    /// Sample every segment, concatenating results in segment order.
    pub fn sample_segments(&self, segments: &[Segment]) -> SampledTracks {
        let mut all = SampledTracks::default();
        for segment in segments {
            let sampled = self.sample_points(&segment.points);
            debug!(
                "{}: {} points, {} samples",
                segment.source.display(),
                segment.points.len(),
                sampled.samples.len()
            );
            all.samples.extend(sampled.samples);
            all.paths.extend(sampled.paths);
            all.suspicious.extend(sampled.suspicious);
        }
        all
    }
}

fn elapsed_seconds(last: &TrackPoint, new: &TrackPoint) -> f64 {
    let delta = new.timestamp - last.timestamp;
    // Sub-second precision matters for 1 Hz recorders
    delta.num_milliseconds() as f64 / 1000.0
}

/// Flat-earth distance in miles between two nearby points.
///
/// Longitude degrees are scaled by the cosine of the newer point's latitude.
pub fn equirectangular_miles(last: &TrackPoint, new: &TrackPoint) -> f64 {
    let cos_lat = new.latitude.to_radians().cos();
    let miles_per_lon_degree = EARTH_CIRCUMFERENCE_MI * cos_lat / 360.0;
    let k = 1.0 / cos_lat;
    let d_lat = k * miles_per_lon_degree * (new.latitude - last.latitude);
    let d_lon = miles_per_lon_degree * (new.longitude - last.longitude);
    (d_lat.powi(2) + d_lon.powi(2)).sqrt()
}
