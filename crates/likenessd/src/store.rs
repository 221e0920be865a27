//! Keyed persistence of one [`PersonProfile`] per person name.

use likeness_core::PersonProfile;
#[cfg(test)]
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::RwLock;
use thiserror::Error;

const PROFILE_EXT: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("profile for {name:?} is corrupt: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode profile: {0}")]
    Encode(#[from] serde_json::Error),
    #[cfg(test)]
    #[error("store lock poisoned")]
    Poisoned,
}

/// Profile persistence. `put` fully replaces any previous profile.
pub trait ProfileStore: Send + Sync {
    fn put(&self, name: &str, profile: &PersonProfile) -> Result<(), StoreError>;
    fn get(&self, name: &str) -> Result<Option<PersonProfile>, StoreError>;
    /// Returns whether a profile existed.
    fn remove(&self, name: &str) -> Result<bool, StoreError>;
    /// Enrolled names, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// One pretty-printed JSON file per person.
///
/// Writes land in a temporary file that is then renamed over the target, so
/// readers see either the old or the new profile, never a torn write.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| io_err(&dir, source))?;
        tracing::info!(dir = %dir.display(), "profile store opened");
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{PROFILE_EXT}", encode_name(name)))
    }
}

impl ProfileStore for JsonFileStore {
    fn put(&self, name: &str, profile: &PersonProfile) -> Result<(), StoreError> {
        let path = self.path_for(name);
        let tmp = path.with_extension(format!("{PROFILE_EXT}.tmp"));
        let data = serde_json::to_vec_pretty(profile)?;

        let mut file = std::fs::File::create(&tmp).map_err(|source| io_err(&tmp, source))?;
        file.write_all(&data)
            .and_then(|_| file.sync_all())
            .map_err(|source| io_err(&tmp, source))?;
        drop(file);

        std::fs::rename(&tmp, &path).map_err(|source| io_err(&path, source))?;
        tracing::debug!(name, path = %path.display(), bytes = data.len(), "profile written");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<PersonProfile>, StoreError> {
        let path = self.path_for(name);
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_err(&path, source)),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                name: name.to_string(),
                source,
            })
    }

    fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_err(&path, source)),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| io_err(&self.dir, source))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_err(&self.dir, source))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_name(stem) {
                Some(name) => names.push(name),
                None => tracing::warn!(file = %path.display(), "skipping unrecognised profile file"),
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-process store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, PersonProfile>>,
}

#[cfg(test)]
impl ProfileStore for MemoryStore {
    fn put(&self, name: &str, profile: &PersonProfile) -> Result<(), StoreError> {
        let mut map = self.profiles.write().map_err(|_| StoreError::Poisoned)?;
        map.insert(name.to_string(), profile.clone());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<PersonProfile>, StoreError> {
        let map = self.profiles.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(name).cloned())
    }

    fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let mut map = self.profiles.write().map_err(|_| StoreError::Poisoned)?;
        Ok(map.remove(name).is_some())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let map = self.profiles.read().map_err(|_| StoreError::Poisoned)?;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Map a person name to a safe file stem: ASCII alphanumerics, `-` and `_`
/// pass through, every other byte becomes `%XX`.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_name(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use likeness_core::NormalizedEmbedding;
    use tempfile::tempdir;

    fn profile(seed: f32) -> PersonProfile {
        PersonProfile::build(vec![
            NormalizedEmbedding::new(&[1.0, seed, 0.0]),
            NormalizedEmbedding::new(&[1.0, 0.0, seed]),
        ])
        .unwrap()
    }

    #[test]
    fn test_name_encoding_roundtrip() {
        for name in ["alice", "Bob_Smith-2", "../etc/passwd", "zoë", "a b%c", ""] {
            let encoded = encode_name(name);
            assert!(!encoded.contains('/'));
            assert!(!encoded.contains('.'));
            assert_eq!(decode_name(&encoded).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_file_store_put_get() {
        let tmp = tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        assert!(store.get("alice").unwrap().is_none());

        let p = profile(0.1);
        store.put("alice", &p).unwrap();
        let loaded = store.get("alice").unwrap().unwrap();
        assert_eq!(loaded.samples(), 2);
        assert!((loaded.max_intra_distance - p.max_intra_distance).abs() < 1e-6);
        assert!(loaded.centroid.distance(&p.centroid) < 1e-6);
        assert_eq!(loaded.enrolled_at, p.enrolled_at);
    }

    #[test]
    fn test_file_store_put_replaces() {
        let tmp = tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        store.put("alice", &profile(0.1)).unwrap();

        let single = PersonProfile::build(vec![NormalizedEmbedding::new(&[0.0, 1.0, 0.0])]).unwrap();
        store.put("alice", &single).unwrap();
        assert_eq!(store.get("alice").unwrap().unwrap().samples(), 1);
        assert_eq!(store.list().unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_file_store_list_and_remove() {
        let tmp = tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        store.put("zoë", &profile(0.2)).unwrap();
        store.put("alice", &profile(0.3)).unwrap();
        assert_eq!(store.list().unwrap(), vec!["alice".to_string(), "zoë".to_string()]);

        assert!(store.remove("alice").unwrap());
        assert!(!store.remove("alice").unwrap());
        assert_eq!(store.list().unwrap(), vec!["zoë".to_string()]);
    }

    #[test]
    fn test_file_store_corrupt_profile() {
        let tmp = tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("mallory.json"), b"{ not json").unwrap();
        assert!(matches!(
            store.get("mallory"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::default();
        assert!(store.get("bob").unwrap().is_none());
        store.put("bob", &profile(0.4)).unwrap();
        assert!(store.get("bob").unwrap().is_some());
        assert_eq!(store.list().unwrap(), vec!["bob".to_string()]);
        assert!(store.remove("bob").unwrap());
        assert!(store.get("bob").unwrap().is_none());
    }
}
