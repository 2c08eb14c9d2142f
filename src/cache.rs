/// Key-value caches for network lookups
///
/// Geocode responses and map images are cached on disk so repeated runs over
/// the same area stay offline. Callers get a `KeyValueCache` injected and
/// never touch the file layout directly.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{HexrunsError, Result};

pub trait KeyValueCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;
}

/// One file per key inside a directory, named by the percent-encoded key.
#[derive(Debug, Clone)]
pub struct DirCache {
    dir: PathBuf,
}

impl DirCache {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(DirCache {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(percent_encode(key))
    }
}

impl KeyValueCache for DirCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        debug!("Cache hit: {}", path.display());
        Ok(Some(fs::read(path)?))
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

/// All entries in a single JSON object file, rewritten on every insert.
///
/// Values must themselves be JSON documents.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: BTreeMap<String, serde_json::Value>,
}

impl JsonFileCache {
    /// Load `path`, starting empty when the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read(path)?;
            serde_json::from_slice(&raw).map_err(|e| {
                HexrunsError::Cache(format!("{} is not a JSON object: {}", path.display(), e))
            })?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };

        Ok(JsonFileCache {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl KeyValueCache for JsonFileCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.entries
            .get(key)
            .map(serde_json::to_vec)
            .transpose()
            .map_err(HexrunsError::from)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let parsed: serde_json::Value = serde_json::from_slice(value)?;
        self.entries.insert(key.to_string(), parsed);
        if let Err(e) = fs::write(&self.path, serde_json::to_vec(&self.entries)?) {
            warn!("Could not write {}: {}", self.path.display(), e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryCache {
    pub entries: std::collections::HashMap<String, Vec<u8>>,
}

#[cfg(test)]
impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Percent-encode every byte outside `A-Z a-z 0-9 _ . - ~`.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode_has_no_safe_slash() {
        assert_eq!(
            percent_encode("http://a.b/c?x=1&y=2,3"),
            "http%3A%2F%2Fa.b%2Fc%3Fx%3D1%26y%3D2%2C3"
        );
        assert_eq!(percent_encode("Cambridge, MA"), "Cambridge%2C%20MA");
    }

    #[test]
    fn test_dir_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DirCache::open(&dir.path().join("cache")).unwrap();
        let key = "http://maps.example/staticmap?zoom=14";

        assert_eq!(cache.get(key).unwrap(), None);
        cache.put(key, b"\x89PNG").unwrap();
        assert_eq!(cache.get(key).unwrap(), Some(b"\x89PNG".to_vec()));
        assert!(cache.path_for(key).file_name().unwrap().to_string_lossy().starts_with("http%3A"));
    }

    #[test]
    fn test_json_cache_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");

        let mut cache = JsonFileCache::open(&path).unwrap();
        cache.put("Somerville", br#"{"bounds": {"northeast": {"lat": 1.0, "lng": 2.0}}}"#).unwrap();
        assert!(cache.put("bad", b"not json").is_err());

        let reopened = JsonFileCache::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        let raw = reopened.get("Somerville").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["bounds"]["northeast"]["lng"], 2.0);
        assert_eq!(reopened.get("Medford").unwrap(), None);
    }

    #[test]
    fn test_corrupt_json_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(JsonFileCache::open(&path), Err(HexrunsError::Cache(_))));
    }
}
