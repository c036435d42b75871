//! JSON file storage under the data directory. Each save rewrites the whole file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use wifihome_core::{ConnectedDevice, Storage, StorageError, UsageSnapshot};

const USAGE_FILE: &str = "usage.json";
const DEVICES_FILE: &str = "devices.json";
const DEVICE_ID_FILE: &str = "device_id";

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable id announced to other devices; generated on first use.
    pub fn device_id(&self) -> Result<String, StorageError> {
        let path = self.dir.join(DEVICE_ID_FILE);
        match std::fs::read_to_string(&path) {
            Ok(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Ok(_) => self.new_device_id(&path),
            Err(e) if e.kind() == ErrorKind::NotFound => self.new_device_id(&path),
            Err(e) => Err(e.into()),
        }
    }

    fn new_device_id(&self, path: &Path) -> Result<String, StorageError> {
        let id = uuid::Uuid::new_v4().to_string();
        write_atomic(path, id.as_bytes())?;
        tracing::info!(device_id = %id, "generated device id");
        Ok(id)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let path = self.dir.join(name);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        write_atomic(&self.dir.join(name), &bytes)
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.dir.join(name)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl Storage for JsonStore {
    fn load_usage_data(&self) -> Result<Option<UsageSnapshot>, StorageError> {
        self.read_json(USAGE_FILE)
    }

    fn save_usage_data(&mut self, data: &UsageSnapshot) -> Result<(), StorageError> {
        self.write_json(USAGE_FILE, data)
    }

    fn load_connected_devices(&self) -> Result<Vec<ConnectedDevice>, StorageError> {
        Ok(self.read_json(DEVICES_FILE)?.unwrap_or_default())
    }

    fn save_connected_devices(&mut self, devices: &[ConnectedDevice]) -> Result<(), StorageError> {
        self.write_json(DEVICES_FILE, devices)
    }

    fn reset_data(&mut self) -> Result<(), StorageError> {
        self.remove(USAGE_FILE)?;
        self.remove(DEVICES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> ConnectedDevice {
        ConnectedDevice {
            device_id: id.into(),
            device_name: format!("{id} phone"),
            download_bytes: 10,
            upload_bytes: 5,
            total_bytes: 15,
            last_seen: chrono::Utc::now(),
            is_online: true,
        }
    }

    #[test]
    fn empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        assert!(store.load_usage_data().unwrap().is_none());
        assert!(store.load_connected_devices().unwrap().is_empty());
    }

    #[test]
    fn saves_overwrite_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();
        let mut usage = UsageSnapshot {
            device_name: "desk".into(),
            is_tracking: true,
            ..Default::default()
        };
        store.save_usage_data(&usage).unwrap();
        usage.add_usage(1024, 0, chrono::Utc::now());
        store.save_usage_data(&usage).unwrap();
        assert_eq!(store.load_usage_data().unwrap(), Some(usage));

        store
            .save_connected_devices(&[device("a"), device("b")])
            .unwrap();
        store.save_connected_devices(&[device("c")]).unwrap();
        let ids: Vec<_> = store
            .load_connected_devices()
            .unwrap()
            .into_iter()
            .map(|d| d.device_id)
            .collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[test]
    fn reset_removes_usage_and_devices() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();
        store.save_usage_data(&UsageSnapshot::default()).unwrap();
        store.save_connected_devices(&[device("a")]).unwrap();
        store.reset_data().unwrap();
        store.reset_data().unwrap();
        assert!(store.load_usage_data().unwrap().is_none());
        assert!(store.load_connected_devices().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(USAGE_FILE), b"{not json").unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load_usage_data(),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn device_id_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let first = store.device_id().unwrap();
        assert_eq!(store.device_id().unwrap(), first);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }
}
