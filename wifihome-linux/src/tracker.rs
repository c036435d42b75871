//! Wi-Fi usage tracking from kernel interface counters, read through `sysinfo`.
//!
//! The tracking flag lives in a marker file so that every process (daemon and
//! one-shot CLI commands) sees the same live state.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sysinfo::Networks;
use wifihome_core::{Tracker, TrackerError};

const NET_WIRELESS: &str = "/proc/net/wireless";
const FLAG_FILE: &str = "tracking";

/// Cumulative byte counters for one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Per-interface cumulative counters.
pub trait CounterSource: Send {
    fn counters(&mut self) -> HashMap<String, Counters>;
}

/// Counters from `sysinfo::Networks`, refreshed on every read.
pub struct SysinfoCounters {
    networks: Networks,
}

impl SysinfoCounters {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl CounterSource for SysinfoCounters {
    fn counters(&mut self) -> HashMap<String, Counters> {
        // Picks up interfaces that appeared since the last read.
        self.networks.refresh_list();
        let mut out = HashMap::new();
        for (name, data) in &self.networks {
            out.insert(
                name.clone(),
                Counters {
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                },
            );
        }
        out
    }
}

/// Wireless interfaces listed in /proc/net/wireless (two header lines, then `iface: ...`).
pub fn parse_wireless(text: &str) -> Vec<String> {
    text.lines()
        .skip(2)
        .filter_map(|l| l.split_once(':').map(|(n, _)| n.trim().to_string()))
        .filter(|n| !n.is_empty())
        .collect()
}

/// Configured interface, else the first wireless one, else the first `wl*` name.
pub fn detect_interface(
    configured: Option<&str>,
    wireless: &[String],
    counters: &HashMap<String, Counters>,
) -> Option<String> {
    if let Some(name) = configured {
        return Some(name.to_string());
    }
    if let Some(name) = wireless.first() {
        return Some(name.clone());
    }
    let mut names: Vec<&String> = counters.keys().filter(|n| n.starts_with("wl")).collect();
    names.sort();
    names.first().map(|n| n.to_string())
}

fn read_optional(path: &Path) -> Result<String, TrackerError> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Resolves the Wi-Fi interface and reads its counters.
pub struct InterfaceSource {
    configured: Option<String>,
    counters: Box<dyn CounterSource>,
    wireless: PathBuf,
}

impl fmt::Debug for InterfaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceSource")
            .field("configured", &self.configured)
            .field("wireless", &self.wireless)
            .finish_non_exhaustive()
    }
}

impl InterfaceSource {
    pub fn new(configured: Option<String>) -> Self {
        Self {
            configured,
            counters: Box::new(SysinfoCounters::new()),
            wireless: PathBuf::from(NET_WIRELESS),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_counters(
        configured: Option<String>,
        counters: impl CounterSource + 'static,
        wireless: PathBuf,
    ) -> Self {
        Self {
            configured,
            counters: Box::new(counters),
            wireless,
        }
    }

    fn resolve(
        &self,
        counters: &HashMap<String, Counters>,
    ) -> Result<String, TrackerError> {
        let wireless = parse_wireless(&read_optional(&self.wireless)?);
        detect_interface(self.configured.as_deref(), &wireless, counters)
            .ok_or(TrackerError::NoInterface)
    }

    pub fn interface(&mut self) -> Result<String, TrackerError> {
        let counters = self.counters.counters();
        self.resolve(&counters)
    }

    pub fn read(&mut self) -> Result<(String, Counters), TrackerError> {
        let counters = self.counters.counters();
        let iface = self.resolve(&counters)?;
        let c = counters
            .get(&iface)
            .copied()
            .ok_or_else(|| TrackerError::Unavailable(format!("interface {iface} not present")))?;
        Ok((iface, c))
    }
}

/// Tracker whose on/off state is a marker file in the data directory.
#[derive(Debug)]
pub struct WifiTracker {
    flag: PathBuf,
    source: InterfaceSource,
}

impl WifiTracker {
    pub fn new(data_dir: &Path, source: InterfaceSource) -> Self {
        Self {
            flag: data_dir.join(FLAG_FILE),
            source,
        }
    }
}

impl Tracker for WifiTracker {
    fn is_tracking(&self) -> Result<bool, TrackerError> {
        match std::fs::metadata(&self.flag) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn start_tracking(&mut self) -> Result<(), TrackerError> {
        let iface = self.source.interface()?;
        std::fs::write(&self.flag, iface.as_bytes())?;
        tracing::info!(interface = %iface, "tracking started");
        Ok(())
    }

    fn stop_tracking(&mut self) -> Result<(), TrackerError> {
        match std::fs::remove_file(&self.flag) {
            Ok(()) => tracing::info!("tracking stopped"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Turns cumulative counters into per-sample deltas.
#[derive(Debug)]
pub struct UsageSampler {
    source: InterfaceSource,
    last: Option<(String, Counters)>,
}

impl UsageSampler {
    pub fn new(source: InterfaceSource) -> Self {
        Self { source, last: None }
    }

    /// Bytes (download, upload) since the previous sample. The first sample, or one
    /// taken after the interface changed, only sets the baseline.
    pub fn sample(&mut self) -> Result<(u64, u64), TrackerError> {
        let (iface, now) = self.source.read()?;
        let delta = match &self.last {
            Some((prev_iface, prev)) if *prev_iface == iface => counter_delta(*prev, now),
            _ => (0, 0),
        };
        self.last = Some((iface, now));
        Ok(delta)
    }
}

/// A counter that went backwards was reset (interface restarted): count from zero.
fn counter_delta(prev: Counters, now: Counters) -> (u64, u64) {
    let step = |p: u64, n: u64| if n >= p { n - p } else { n };
    (step(prev.rx_bytes, now.rx_bytes), step(prev.tx_bytes, now.tx_bytes))
}

/// Settable counters shared between clones, for tests of the tracker and the actor.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeCounters(std::sync::Arc<std::sync::Mutex<HashMap<String, Counters>>>);

#[cfg(test)]
impl FakeCounters {
    pub fn set(&self, iface: &str, rx_bytes: u64, tx_bytes: u64) {
        self.0
            .lock()
            .unwrap()
            .insert(iface.to_string(), Counters { rx_bytes, tx_bytes });
    }
}

#[cfg(test)]
impl CounterSource for FakeCounters {
    fn counters(&mut self) -> HashMap<String, Counters> {
        self.0.lock().unwrap().clone()
    }
}
