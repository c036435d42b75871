//! WifiHome core: usage tracking state, LAN device registry, and display formatting.
//! Host-driven: no I/O; the host supplies collaborators and forwards events.

pub mod controller;
pub mod devices;
pub mod error;
pub mod format;
pub mod model;
pub mod protocol;
pub mod services;
pub mod usage;
pub mod wire;

#[cfg(test)]
mod testing;

pub use controller::{PageController, Services, WipeOutcome, ERROR_CONTEXT};
pub use devices::DeviceRegistry;
pub use error::{CoreError, StorageError, TrackerError};
pub use format::format_bytes;
pub use model::{ConnectedDevice, SnapshotState, UsageSnapshot};
pub use protocol::{Message, PROTOCOL_VERSION};
pub use services::{
    Discovery, ErrorLogger, PromptOutcome, Prompter, Storage, Tracker, TracingErrorLogger,
};
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};
