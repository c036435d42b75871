//! Host-driven page controller: owns usage and device state, receives events from the
//! host, and exposes display-ready fields. Every entry point is a failure boundary that
//! logs and swallows errors, leaving state as it was.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::devices::DeviceRegistry;
use crate::error::CoreError;
use crate::format::format_bytes;
use crate::model::{ConnectedDevice, SnapshotState, UsageSnapshot};
use crate::services::{Discovery, ErrorLogger, PromptOutcome, Prompter, Storage, Tracker};
use crate::usage;

/// Context attached to every error the controller logs.
pub const ERROR_CONTEXT: &str = "home page";

const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Collaborators handed to the controller by the host.
pub struct Services {
    pub tracker: Box<dyn Tracker + Send>,
    pub discovery: Box<dyn Discovery + Send>,
    pub storage: Box<dyn Storage + Send>,
    pub logger: Box<dyn ErrorLogger + Send>,
}

/// Result of a wipe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    Cancelled,
    WrongSecret,
    Declined,
    Wiped,
    /// Confirmed, but stopping the tracker or resetting storage failed (logged).
    Failed,
}

pub struct PageController {
    snapshot: SnapshotState,
    registry: DeviceRegistry,
    tracker: Box<dyn Tracker + Send>,
    discovery: Box<dyn Discovery + Send>,
    storage: Box<dyn Storage + Send>,
    logger: Box<dyn ErrorLogger + Send>,
    /// Confirmation gate for wipe and host mode. Not a security boundary.
    admin_secret: String,
}

impl PageController {
    /// Build the controller and load usage and device state.
    pub fn new(services: Services, admin_secret: impl Into<String>) -> Self {
        let mut controller = Self {
            snapshot: SnapshotState::Uninitialized,
            registry: DeviceRegistry::new(),
            tracker: services.tracker,
            discovery: services.discovery,
            storage: services.storage,
            logger: services.logger,
            admin_secret: admin_secret.into(),
        };
        controller.load();
        controller
    }

    /// Run `op`; on error log it under [`ERROR_CONTEXT`] and return `None`.
    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T, CoreError>) -> Option<T> {
        match op(self) {
            Ok(v) => Some(v),
            Err(e) => {
                self.logger.log_error(ERROR_CONTEXT, &e);
                None
            }
        }
    }

    fn reload(&mut self) -> Result<(), CoreError> {
        let devices = self.storage.load_connected_devices()?;
        self.snapshot = SnapshotState::from_option(self.storage.load_usage_data()?);
        self.registry.restore(devices);
        usage::reconcile(&mut self.snapshot, self.tracker.as_ref(), self.storage.as_mut())?;
        Ok(())
    }

    /// Reload usage and devices from storage, then reconcile the tracking flag with the
    /// tracker. Storage may have been changed by another process.
    pub fn load(&mut self) {
        self.guarded(Self::reload);
    }

    pub fn on_appearing(&mut self) {
        self.load();
    }

    /// Release discovery sockets.
    pub fn on_disappearing(&mut self) {
        self.discovery.stop_broadcasting();
        self.discovery.stop_listening();
        tracing::debug!("discovery stopped");
    }

    /// Start or stop tracking. Returns the new tracking state, or `None` if it failed.
    pub fn toggle_tracking(&mut self) -> Option<bool> {
        self.guarded(|c| usage::toggle(&mut c.snapshot, c.tracker.as_mut(), c.storage.as_mut()))
    }

    pub fn on_device_discovered(&mut self, device: ConnectedDevice, now: DateTime<Utc>) {
        self.guarded(|c| {
            c.registry
                .on_device_discovered(device, now, c.storage.as_mut())
                .map_err(CoreError::from)
        });
    }

    pub fn on_discovery_error(&mut self, message: String) {
        self.logger
            .log_error(ERROR_CONTEXT, &CoreError::Discovery(message));
    }

    /// Mark devices silent for `timeout` as offline. Returns how many flipped.
    pub fn sweep_devices(&mut self, now: DateTime<Utc>, timeout: Duration) -> usize {
        self.guarded(|c| {
            c.registry
                .sweep_stale(now, timeout, c.storage.as_mut())
                .map_err(CoreError::from)
        })
        .unwrap_or(0)
    }

    /// Add counter deltas while tracking. Returns whether the sample was recorded.
    pub fn record_sample(
        &mut self,
        device_name: &str,
        download: u64,
        upload: u64,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.snapshot.is_tracking() {
            return false;
        }
        self.guarded(|c| {
            let mut next = c.snapshot.get().cloned().unwrap_or_default();
            if next.device_name.is_empty() {
                next.device_name = device_name.to_string();
            }
            next.add_usage(download, upload, now);
            c.storage.save_usage_data(&next)?;
            c.snapshot = SnapshotState::Loaded(next);
            Ok(())
        })
        .is_some()
    }

    /// Reload, then return the usage summary.
    pub fn show_usage(&mut self) -> String {
        self.load();
        self.usage_summary()
    }

    /// Secret, then confirmation; on both, stop tracking, reset storage, and reload.
    pub fn wipe_data(&mut self, prompter: &mut dyn Prompter) -> WipeOutcome {
        let answer = prompter.prompt_secret("Wipe data", "Enter the password to continue:");
        let secret = match answer {
            PromptOutcome::Answered(s) => s,
            PromptOutcome::Cancelled => return WipeOutcome::Cancelled,
        };
        if secret != self.admin_secret {
            return WipeOutcome::WrongSecret;
        }
        if !prompter.confirm(
            "Confirm",
            "Are you sure you want to wipe all usage data? This cannot be undone.",
        ) {
            return WipeOutcome::Declined;
        }
        let wiped = self.guarded(|c| {
            c.tracker.stop_tracking()?;
            c.storage.reset_data()?;
            c.registry.clear();
            Ok(())
        });
        self.load();
        match wiped {
            Some(()) => {
                tracing::info!("usage data wiped");
                WipeOutcome::Wiped
            }
            None => WipeOutcome::Failed,
        }
    }

    /// Secret prompt gating host mode.
    pub fn enter_host_mode(&mut self, prompter: &mut dyn Prompter) -> bool {
        match prompter.prompt_secret("Host mode", "Enter the password to enter host mode:") {
            PromptOutcome::Answered(s) => s == self.admin_secret,
            PromptOutcome::Cancelled => false,
        }
    }

    pub fn snapshot(&self) -> Option<&UsageSnapshot> {
        self.snapshot.get()
    }

    pub fn devices(&self) -> &[ConnectedDevice] {
        self.registry.devices()
    }

    pub fn is_tracking(&self) -> bool {
        self.snapshot.is_tracking()
    }

    pub fn status_message(&self) -> &'static str {
        if self.is_tracking() {
            "Recording usage..."
        } else {
            "Recording stopped"
        }
    }

    pub fn toggle_label(&self) -> &'static str {
        if self.is_tracking() {
            "Stop recording"
        } else {
            "Start recording"
        }
    }

    pub fn device_name(&self) -> String {
        let name = self.snapshot.get().map_or("-", |s| s.device_name.as_str());
        format!("Device: {name}")
    }

    pub fn download_text(&self) -> String {
        format_bytes(self.snapshot.get().map_or(0, |s| s.download_bytes))
    }

    pub fn upload_text(&self) -> String {
        format_bytes(self.snapshot.get().map_or(0, |s| s.upload_bytes))
    }

    pub fn total_text(&self) -> String {
        format_bytes(self.snapshot.get().map_or(0, |s| s.total_bytes))
    }

    pub fn last_update_text(&self) -> String {
        match self.snapshot.get().and_then(|s| s.last_update) {
            Some(t) => format!(
                "Last update: {}",
                t.with_timezone(&Local).format(LAST_UPDATE_FORMAT)
            ),
            None => "Last update: -".to_string(),
        }
    }

    pub fn is_stats_visible(&self) -> bool {
        self.snapshot.get().is_some_and(|s| s.total_bytes > 0)
    }

    pub fn usage_summary(&self) -> String {
        format!(
            "{}\nDownload: {}\nUpload: {}\nTotal: {}\n{}",
            self.device_name(),
            self.download_text(),
            self.upload_text(),
            self.total_text(),
            self.last_update_text()
        )
    }
}
