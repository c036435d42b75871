//! Collaborators the host provides. Core code only talks to these traits.

use crate::error::{StorageError, TrackerError};
use crate::model::{ConnectedDevice, UsageSnapshot};

/// Platform Wi-Fi usage tracker. Commands are idempotent when already in the requested state.
pub trait Tracker {
    fn is_tracking(&self) -> Result<bool, TrackerError>;
    fn start_tracking(&mut self) -> Result<(), TrackerError>;
    fn stop_tracking(&mut self) -> Result<(), TrackerError>;
}

/// LAN discovery service. Events reach the controller as messages; this is the teardown side.
pub trait Discovery {
    fn stop_broadcasting(&mut self);
    fn stop_listening(&mut self);
}

/// Durable local storage. Every save overwrites the previous state entirely.
pub trait Storage {
    fn load_usage_data(&self) -> Result<Option<UsageSnapshot>, StorageError>;
    fn save_usage_data(&mut self, data: &UsageSnapshot) -> Result<(), StorageError>;
    fn load_connected_devices(&self) -> Result<Vec<ConnectedDevice>, StorageError>;
    fn save_connected_devices(&mut self, devices: &[ConnectedDevice]) -> Result<(), StorageError>;
    fn reset_data(&mut self) -> Result<(), StorageError>;
}

/// Error sink. Must not fail.
pub trait ErrorLogger {
    fn log_error(&self, context: &str, error: &dyn std::error::Error);
}

/// Result of a text prompt shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Answered(String),
    Cancelled,
}

/// Interactive prompts. Blocks only the interaction that asked.
pub trait Prompter {
    fn prompt_secret(&mut self, title: &str, message: &str) -> PromptOutcome;
    fn confirm(&mut self, title: &str, message: &str) -> bool;
}

/// Logs through `tracing`; the default logger for hosts without their own sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorLogger;

impl ErrorLogger for TracingErrorLogger {
    fn log_error(&self, context: &str, error: &dyn std::error::Error) {
        tracing::error!(context, %error, "operation failed");
    }
}
