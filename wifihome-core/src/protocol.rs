//! Discovery wire protocol: message types and version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ConnectedDevice;

/// Current protocol version. Announcements from other versions are ignored.
pub const PROTOCOL_VERSION: u8 = 1;

/// All wire message types. Encoding is bincode; framing is length-prefix (see wire module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Broadcast: this device and its current usage counters.
    Announce {
        protocol_version: u8,
        device_id: String,
        device_name: String,
        download_bytes: u64,
        upload_bytes: u64,
        total_bytes: u64,
    },
}

impl Message {
    /// Discovery event for an announcement received at `now`.
    pub fn into_device(self, now: DateTime<Utc>) -> ConnectedDevice {
        match self {
            Message::Announce {
                device_id,
                device_name,
                download_bytes,
                upload_bytes,
                total_bytes,
                ..
            } => ConnectedDevice {
                device_id,
                device_name,
                download_bytes,
                upload_bytes,
                total_bytes,
                last_seen: now,
                is_online: true,
            },
        }
    }
}
