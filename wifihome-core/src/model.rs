//! Usage and device records, persisted as camelCase JSON by the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wi-Fi usage totals for this device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageSnapshot {
    pub device_name: String,
    pub download_bytes: u64,
    pub upload_bytes: u64,
    /// Should equal download + upload; the sampler keeps it that way, loading does not check.
    pub total_bytes: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub is_tracking: bool,
}

impl UsageSnapshot {
    /// Add counter deltas and stamp the update time.
    pub fn add_usage(&mut self, download: u64, upload: u64, now: DateTime<Utc>) {
        self.download_bytes = self.download_bytes.saturating_add(download);
        self.upload_bytes = self.upload_bytes.saturating_add(upload);
        self.total_bytes = self.download_bytes.saturating_add(self.upload_bytes);
        self.last_update = Some(now);
    }
}

/// A device seen on the local network, keyed by `device_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedDevice {
    pub device_id: String,
    pub device_name: String,
    pub download_bytes: u64,
    pub upload_bytes: u64,
    pub total_bytes: u64,
    pub last_seen: DateTime<Utc>,
    pub is_online: bool,
}

/// Snapshot as held by the controller: nothing loaded yet, or a loaded snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SnapshotState {
    #[default]
    Uninitialized,
    Loaded(UsageSnapshot),
}

impl SnapshotState {
    pub fn from_option(snapshot: Option<UsageSnapshot>) -> Self {
        match snapshot {
            Some(s) => SnapshotState::Loaded(s),
            None => SnapshotState::Uninitialized,
        }
    }

    pub fn get(&self) -> Option<&UsageSnapshot> {
        match self {
            SnapshotState::Loaded(s) => Some(s),
            SnapshotState::Uninitialized => None,
        }
    }

    /// Mutable access; default-constructs the snapshot on first use.
    pub fn get_or_default(&mut self) -> &mut UsageSnapshot {
        if let SnapshotState::Uninitialized = self {
            *self = SnapshotState::Loaded(UsageSnapshot::default());
        }
        match self {
            SnapshotState::Loaded(s) => s,
            SnapshotState::Uninitialized => unreachable!("initialized above"),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.get().is_some_and(|s| s.is_tracking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_json_uses_camel_case() {
        let s = UsageSnapshot {
            device_name: "phone".into(),
            download_bytes: 10,
            upload_bytes: 5,
            total_bytes: 15,
            last_update: None,
            is_tracking: true,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"downloadBytes\":10"));
        assert!(json.contains("\"isTracking\":true"));
    }

    #[test]
    fn snapshot_missing_fields_default() {
        let s: UsageSnapshot = serde_json::from_str(r#"{"deviceName":"x"}"#).unwrap();
        assert_eq!(s.device_name, "x");
        assert_eq!(s.total_bytes, 0);
        assert!(!s.is_tracking);
    }

    #[test]
    fn add_usage_keeps_total_in_step() {
        let mut s = UsageSnapshot::default();
        let now = Utc::now();
        s.add_usage(100, 20, now);
        s.add_usage(1, 2, now);
        assert_eq!(s.download_bytes, 101);
        assert_eq!(s.upload_bytes, 22);
        assert_eq!(s.total_bytes, 123);
        assert_eq!(s.last_update, Some(now));
    }

    #[test]
    fn state_default_constructs_on_mutable_access() {
        let mut state = SnapshotState::Uninitialized;
        assert!(state.get().is_none());
        assert!(!state.is_tracking());
        state.get_or_default().is_tracking = true;
        assert!(state.is_tracking());
    }
}
