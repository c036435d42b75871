//! In-memory collaborators for unit tests. Clones share state so tests can inspect it.

use std::sync::{Arc, Mutex};

use crate::error::{StorageError, TrackerError};
use crate::model::{ConnectedDevice, UsageSnapshot};
use crate::services::{Discovery, ErrorLogger, PromptOutcome, Prompter, Storage, Tracker};

#[derive(Debug, Default)]
pub struct TrackerState {
    pub tracking: bool,
    pub starts: usize,
    pub stops: usize,
    pub fail: bool,
}

#[derive(Debug, Default, Clone)]
pub struct FakeTracker(pub Arc<Mutex<TrackerState>>);

impl FakeTracker {
    pub fn with_tracking(tracking: bool) -> Self {
        let t = Self::default();
        t.0.lock().unwrap().tracking = tracking;
        t
    }

    pub fn set_tracking(&self, tracking: bool) {
        self.0.lock().unwrap().tracking = tracking;
    }

    pub fn set_fail(&self, fail: bool) {
        self.0.lock().unwrap().fail = fail;
    }

    pub fn starts(&self) -> usize {
        self.0.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.0.lock().unwrap().stops
    }
}

impl Tracker for FakeTracker {
    fn is_tracking(&self) -> Result<bool, TrackerError> {
        let s = self.0.lock().unwrap();
        if s.fail {
            return Err(TrackerError::Unavailable("fake failure".into()));
        }
        Ok(s.tracking)
    }

    fn start_tracking(&mut self) -> Result<(), TrackerError> {
        let mut s = self.0.lock().unwrap();
        if s.fail {
            return Err(TrackerError::Unavailable("fake failure".into()));
        }
        s.tracking = true;
        s.starts += 1;
        Ok(())
    }

    fn stop_tracking(&mut self) -> Result<(), TrackerError> {
        let mut s = self.0.lock().unwrap();
        if s.fail {
            return Err(TrackerError::Unavailable("fake failure".into()));
        }
        s.tracking = false;
        s.stops += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StoreState {
    pub usage: Option<UsageSnapshot>,
    pub devices: Vec<ConnectedDevice>,
    pub usage_saves: usize,
    pub device_saves: usize,
    pub resets: usize,
    pub fail_reads: bool,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage(pub Arc<Mutex<StoreState>>);

impl MemoryStorage {
    pub fn with_usage(usage: UsageSnapshot) -> Self {
        let s = Self::default();
        s.0.lock().unwrap().usage = Some(usage);
        s
    }

    pub fn usage(&self) -> Option<UsageSnapshot> {
        self.0.lock().unwrap().usage.clone()
    }

    pub fn devices(&self) -> Vec<ConnectedDevice> {
        self.0.lock().unwrap().devices.clone()
    }

    pub fn usage_saves(&self) -> usize {
        self.0.lock().unwrap().usage_saves
    }

    pub fn device_saves(&self) -> usize {
        self.0.lock().unwrap().device_saves
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.0.lock().unwrap().fail_reads = fail;
    }
}

impl Storage for MemoryStorage {
    fn load_usage_data(&self) -> Result<Option<UsageSnapshot>, StorageError> {
        let s = self.0.lock().unwrap();
        if s.fail_reads {
            return Err(StorageError::Corrupt("fake failure".into()));
        }
        Ok(s.usage.clone())
    }

    fn save_usage_data(&mut self, data: &UsageSnapshot) -> Result<(), StorageError> {
        let mut s = self.0.lock().unwrap();
        s.usage = Some(data.clone());
        s.usage_saves += 1;
        Ok(())
    }

    fn load_connected_devices(&self) -> Result<Vec<ConnectedDevice>, StorageError> {
        Ok(self.0.lock().unwrap().devices.clone())
    }

    fn save_connected_devices(&mut self, devices: &[ConnectedDevice]) -> Result<(), StorageError> {
        let mut s = self.0.lock().unwrap();
        s.devices = devices.to_vec();
        s.device_saves += 1;
        Ok(())
    }

    fn reset_data(&mut self) -> Result<(), StorageError> {
        let mut s = self.0.lock().unwrap();
        s.usage = None;
        s.devices.clear();
        s.resets += 1;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct FakeDiscovery(pub Arc<Mutex<Vec<&'static str>>>);

impl FakeDiscovery {
    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

impl Discovery for FakeDiscovery {
    fn stop_broadcasting(&mut self) {
        self.0.lock().unwrap().push("stop_broadcasting");
    }

    fn stop_listening(&mut self) {
        self.0.lock().unwrap().push("stop_listening");
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingLogger(pub Arc<Mutex<Vec<(String, String)>>>);

impl RecordingLogger {
    pub fn entries(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl ErrorLogger for RecordingLogger {
    fn log_error(&self, context: &str, error: &dyn std::error::Error) {
        self.0
            .lock()
            .unwrap()
            .push((context.to_string(), error.to_string()));
    }
}

/// Answers prompts from a script.
#[derive(Debug)]
pub struct ScriptedPrompter {
    pub secret: PromptOutcome,
    pub confirm: bool,
    pub confirms_asked: usize,
}

impl ScriptedPrompter {
    pub fn new(secret: Option<&str>, confirm: bool) -> Self {
        Self {
            secret: match secret {
                Some(s) => PromptOutcome::Answered(s.to_string()),
                None => PromptOutcome::Cancelled,
            },
            confirm,
            confirms_asked: 0,
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt_secret(&mut self, _title: &str, _message: &str) -> PromptOutcome {
        self.secret.clone()
    }

    fn confirm(&mut self, _title: &str, _message: &str) -> bool {
        self.confirms_asked += 1;
        self.confirm
    }
}
