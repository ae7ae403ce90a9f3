//! Persisted kiosk state
//!
//! A small key-value store abstraction with two backends:
//! - `MemoryStore` - process-local, used by tests and dry runs
//! - `FileStore` - one JSON object on disk, rewritten atomically on each change
//!
//! `StateStore` wraps either backend with typed accessors for the two keys
//! the kiosk persists.

use crate::domain::{DeviceId, GuestId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Key holding the last accepted guest identifier
pub const GUEST_ID_KEY: &str = "guest_id";
/// Key holding the last selected capture device
pub const CAMERA_DEVICE_KEY: &str = "currentCameraDeviceId";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Last-write-wins string store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON-file backed store
///
/// The whole map is kept in memory and flushed after every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open a store file; a missing or unreadable file starts empty
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(map) => {
                    debug!(path = %path.display(), keys = map.len(), "state_store_loaded");
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "state_store_corrupt_starting_empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state_store_unreadable_starting_empty");
                BTreeMap::new()
            }
        };
        Self { path, entries: Mutex::new(entries) }
    }

    /// Write the map to a sibling temp file, then rename over the target
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        let io_err = |source| StoreError::Io { path: self.path.display().to_string(), source };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json.as_bytes()).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Typed view over the persisted kiosk state
///
/// Write failures are logged and swallowed: losing a persisted value must
/// never interrupt scanning.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl StateStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Store backed by a JSON file
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self::new(Arc::new(FileStore::open(path)))
    }

    /// Last accepted identifier, if it still validates
    pub fn guest_id(&self) -> Option<GuestId> {
        let raw = self.inner.get(GUEST_ID_KEY)?;
        match GuestId::parse(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(value = %raw, error = %e, "stored_guest_id_invalid");
                None
            }
        }
    }

    pub fn set_guest_id(&self, id: &GuestId) {
        if let Err(e) = self.inner.set(GUEST_ID_KEY, id.as_str()) {
            error!(error = %e, "guest_id_persist_failed");
        }
    }

    pub fn clear_guest_id(&self) {
        if let Err(e) = self.inner.remove(GUEST_ID_KEY) {
            error!(error = %e, "guest_id_clear_failed");
        }
    }

    /// Last selected capture device; empty values count as unset
    pub fn camera_device_id(&self) -> Option<DeviceId> {
        self.inner.get(CAMERA_DEVICE_KEY).filter(|v| !v.is_empty()).map(DeviceId)
    }

    pub fn set_camera_device_id(&self, id: &DeviceId) {
        if let Err(e) = self.inner.set(CAMERA_DEVICE_KEY, id.as_str()) {
            error!(error = %e, "camera_device_persist_failed");
        }
    }

    pub fn clear_camera_device_id(&self) {
        if let Err(e) = self.inner.remove(CAMERA_DEVICE_KEY) {
            error!(error = %e, "camera_device_clear_failed");
        }
    }

    /// Raw access for diagnostics
    pub fn raw(&self) -> &dyn KeyValueStore {
        self.inner.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "a").unwrap();
        store.set("k", "b").unwrap();
        assert_eq!(store.get("k"), Some("b".to_string()));
        store.remove("k").unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("kiosk.json");

        let store = FileStore::open(&path);
        store.set(GUEST_ID_KEY, "G123456786").unwrap();
        store.set(CAMERA_DEVICE_KEY, "/dev/ttyACM0").unwrap();
        assert!(path.exists());

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(GUEST_ID_KEY), Some("G123456786".to_string()));
        assert_eq!(reopened.get(CAMERA_DEVICE_KEY), Some("/dev/ttyACM0".to_string()));

        reopened.remove(GUEST_ID_KEY).unwrap();
        let again = FileStore::open(&path);
        assert_eq!(again.get(GUEST_ID_KEY), None);
        assert_eq!(again.get(CAMERA_DEVICE_KEY), Some("/dev/ttyACM0".to_string()));
    }

    #[test]
    fn test_file_store_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kiosk.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get(GUEST_ID_KEY), None);
        store.set(GUEST_ID_KEY, "G000000000").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[GUEST_ID_KEY], "G000000000");
    }

    #[test]
    fn test_state_store_typed_accessors() {
        let state = StateStore::in_memory();
        assert!(state.guest_id().is_none());
        assert!(state.camera_device_id().is_none());

        let id = GuestId::parse("G123456786").unwrap();
        state.set_guest_id(&id);
        assert_eq!(state.guest_id(), Some(id));
        state.clear_guest_id();
        assert!(state.guest_id().is_none());

        let device = DeviceId::new("/dev/ttyACM1");
        state.set_camera_device_id(&device);
        assert_eq!(state.camera_device_id(), Some(device));
        state.clear_camera_device_id();
        assert!(state.camera_device_id().is_none());
    }

    #[test]
    fn test_state_store_ignores_invalid_stored_values() {
        let state = StateStore::in_memory();
        state.raw().set(GUEST_ID_KEY, "example").unwrap();
        state.raw().set(CAMERA_DEVICE_KEY, "").unwrap();
        assert!(state.guest_id().is_none());
        assert!(state.camera_device_id().is_none());
    }
}
