//! Known devices on the LAN, merged from discovery events.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::model::ConnectedDevice;
use crate::services::Storage;

/// Ordered device collection, unique by `device_id`. Devices are never removed
/// automatically; silence only marks them offline (see [`DeviceRegistry::sweep_stale`]).
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: Vec<ConnectedDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from previously persisted devices, dropping duplicate ids (first wins).
    pub fn restore(&mut self, devices: Vec<ConnectedDevice>) {
        self.devices.clear();
        for d in devices {
            if self.find(&d.device_id).is_none() {
                self.devices.push(d);
            }
        }
    }

    pub fn devices(&self) -> &[ConnectedDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    fn find(&self, device_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.device_id == device_id)
    }

    /// Merge one discovery event. Known ids get the latest counters (no aggregation),
    /// `last_seen = now` and come back online; new ids are appended. Persists the full list.
    pub fn on_device_discovered(
        &mut self,
        device: ConnectedDevice,
        now: DateTime<Utc>,
        storage: &mut dyn Storage,
    ) -> Result<(), StorageError> {
        match self.find(&device.device_id) {
            Some(i) => {
                let existing = &mut self.devices[i];
                existing.download_bytes = device.download_bytes;
                existing.upload_bytes = device.upload_bytes;
                existing.total_bytes = device.total_bytes;
                existing.last_seen = now;
                existing.is_online = true;
            }
            None => {
                tracing::info!(device_id = %device.device_id, name = %device.device_name, "new device discovered");
                self.devices.push(device);
            }
        }
        storage.save_connected_devices(&self.devices)
    }

    /// Mark devices not seen within `timeout` as offline. Persists only if something changed.
    pub fn sweep_stale(
        &mut self,
        now: DateTime<Utc>,
        timeout: Duration,
        storage: &mut dyn Storage,
    ) -> Result<usize, StorageError> {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let mut flipped = 0;
        for d in self.devices.iter_mut().filter(|d| d.is_online) {
            if now.signed_duration_since(d.last_seen) >= timeout {
                d.is_online = false;
                flipped += 1;
                tracing::debug!(device_id = %d.device_id, "device went offline");
            }
        }
        if flipped > 0 {
            storage.save_connected_devices(&self.devices)?;
        }
        Ok(flipped)
    }
}
