/// GPX track loading
///
/// Scans a directory for `*.gpx` files and turns the first track of each into
/// time-stamped segments. A file that fails to parse aborts the whole load:
/// the aggregates downstream are meaningless over a partial input set.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gpx::{read, Time};
use log::{debug, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{HexrunsError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Points of one recorded segment, in recording order.
#[derive(Debug, Clone)]
pub struct Segment {
    pub source: PathBuf,
    pub points: Vec<TrackPoint>,
}

/// All `*.gpx` files directly inside `dir`, sorted by path.
pub fn find_gpx_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut gpx_files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| HexrunsError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_gpx = entry
            .path()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("gpx"))
            .unwrap_or(false);
        if is_gpx {
            gpx_files.push(entry.path().to_path_buf());
        }
    }
    gpx_files.sort();
    Ok(gpx_files)
}

/// Parse the given GPX files in parallel, keeping their order.
pub fn load_files(gpx_files: &[PathBuf]) -> Result<Vec<Segment>> {
    info!(
        "Parsing {} GPX files on {} cores",
        gpx_files.len(),
        num_cpus::get()
    );

    let per_file: Vec<Vec<Segment>> = gpx_files
        .par_iter()
        .map(|path| parse_gpx_file(path))
        .collect::<Result<_>>()?;

    let segments: Vec<Segment> = per_file.into_iter().flatten().collect();
    info!("Loaded {} segments", segments.len());
    Ok(segments)
}

pub fn parse_gpx_file(path: &Path) -> Result<Vec<Segment>> {
    let file = File::open(path)?;
    parse_gpx(BufReader::new(file), path)
}

/// Parse GPX content, keeping only the first track.
pub fn parse_gpx<R: Read>(reader: R, source: &Path) -> Result<Vec<Segment>> {
    let gpx = read(reader).map_err(|e| HexrunsError::Parse {
        path: source.to_path_buf(),
        message: e.to_string(),
    })?;

    if gpx.tracks.len() > 1 {
        debug!(
            "{}: {} tracks, only the first is used",
            source.display(),
            gpx.tracks.len()
        );
    }

    let Some(track) = gpx.tracks.into_iter().next() else {
        warn!("{}: no tracks", source.display());
        return Ok(Vec::new());
    };

    let mut segments = Vec::with_capacity(track.segments.len());
    for segment in track.segments {
        if segment.points.is_empty() {
            continue;
        }

        let mut points = Vec::with_capacity(segment.points.len());
        for (index, waypoint) in segment.points.iter().enumerate() {
            let timestamp = waypoint
                .time
                .as_ref()
                .ok_or_else(|| HexrunsError::Parse {
                    path: source.to_path_buf(),
                    message: format!("track point {} has no timestamp", index),
                })
                .and_then(|t| to_utc(t, source))?;

            points.push(TrackPoint {
                latitude: waypoint.point().y(),
                longitude: waypoint.point().x(),
                timestamp,
            });
        }

        segments.push(Segment {
            source: source.to_path_buf(),
            points,
        });
    }

    Ok(segments)
}

fn to_utc(time: &Time, source: &Path) -> Result<DateTime<Utc>> {
    let parse_error = |message: String| HexrunsError::Parse {
        path: source.to_path_buf(),
        message,
    };
    let formatted = time.format().map_err(|e| parse_error(e.to_string()))?;
    formatted
        .parse::<DateTime<Utc>>()
        .map_err(|e| parse_error(format!("bad timestamp {}: {}", formatted, e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;

    pub(crate) fn gpx_document(tracks: &[&[&[(f64, f64, &str)]]]) -> String {
        let mut body = String::new();
        for segments in tracks {
            body.push_str("<trk><name>run</name>");
            for points in segments.iter() {
                body.push_str("<trkseg>");
                for (lat, lon, time) in points.iter() {
                    body.push_str(&format!(
                        "<trkpt lat=\"{}\" lon=\"{}\"><time>{}</time></trkpt>",
                        lat, lon, time
                    ));
                }
                body.push_str("</trkseg>");
            }
            body.push_str("</trk>");
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <gpx version=\"1.1\" creator=\"hexruns-test\" xmlns=\"http://www.topografix.com/GPX/1/1\">{}</gpx>",
            body
        )
    }

    #[test]
    fn test_only_first_track_is_read() {
        let doc = gpx_document(&[
            &[&[
                (42.0, -71.0, "2020-01-01T00:00:00Z"),
                (42.001, -71.001, "2020-01-01T00:00:30Z"),
            ]],
            &[&[(10.0, 10.0, "2020-01-02T00:00:00Z")]],
        ]);

        let segments = parse_gpx(doc.as_bytes(), Path::new("two_tracks.gpx")).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].points.len(), 2);
        assert_eq!(segments[0].points[0].latitude, 42.0);
        assert_eq!(segments[0].points[1].longitude, -71.001);
        let elapsed = segments[0].points[1].timestamp - segments[0].points[0].timestamp;
        assert_eq!(elapsed.num_seconds(), 30);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let result = parse_gpx("<gpx><trk>".as_bytes(), Path::new("broken.gpx"));
        assert!(matches!(result, Err(HexrunsError::Parse { .. })));
    }

    #[test]
    fn test_point_without_time_is_parse_error() {
        let doc = "<?xml version=\"1.0\"?>\
            <gpx version=\"1.1\" creator=\"t\"><trk><trkseg>\
            <trkpt lat=\"1.0\" lon=\"2.0\"></trkpt>\
            </trkseg></trk></gpx>";
        let result = parse_gpx(doc.as_bytes(), Path::new("untimed.gpx"));
        assert!(matches!(result, Err(HexrunsError::Parse { .. })));
    }

    #[test]
    fn test_load_scans_directory() {
        let dir = tempfile::tempdir().unwrap();
        let run = gpx_document(&[&[&[
            (42.0, -71.0, "2020-01-01T00:00:00Z"),
            (42.001, -71.0, "2020-01-01T00:01:00Z"),
        ]]]);
        fs::write(dir.path().join("b.gpx"), &run).unwrap();
        fs::write(dir.path().join("a.GPX"), &run).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a track").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.gpx"), &run).unwrap();

        let files = find_gpx_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.GPX", "b.gpx"]);

        let segments = load_files(&files).unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].source.ends_with("a.GPX"));
    }

    #[test]
    fn test_one_bad_file_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let run = gpx_document(&[&[&[(42.0, -71.0, "2020-01-01T00:00:00Z")]]]);
        fs::write(dir.path().join("good.gpx"), &run).unwrap();
        fs::write(dir.path().join("bad.gpx"), "garbage").unwrap();

        let files = find_gpx_files(dir.path()).unwrap();
        assert!(matches!(load_files(&files), Err(HexrunsError::Parse { .. })));
    }
}
