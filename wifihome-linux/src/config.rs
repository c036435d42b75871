//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration. File: ~/.config/wifihome/config.toml or /etc/wifihome/config.toml.
/// Env overrides: WIFIHOME_DISCOVERY_PORT, WIFIHOME_INTERFACE, WIFIHOME_DATA_DIR,
/// WIFIHOME_DEVICE_NAME, WIFIHOME_ADMIN_SECRET.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Discovery UDP port (default 45680).
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Wi-Fi interface to count; autodetected when unset.
    #[serde(default)]
    pub interface: Option<String>,
    /// Where usage, devices, and the tracking flag live.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Name announced to other devices (default: hostname).
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_announce_interval_secs")]
    pub announce_interval_secs: u64,
    /// Devices silent this long are shown offline.
    #[serde(default = "default_device_timeout_secs")]
    pub device_timeout_secs: u64,
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// Confirmation gate for wipe and host mode.
    #[serde(default = "default_admin_secret")]
    pub admin_secret: String,
}

fn default_discovery_port() -> u16 {
    45680
}
fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(h) => PathBuf::from(h).join(".local/share/wifihome"),
        None => PathBuf::from("/var/lib/wifihome"),
    }
}
fn default_device_name() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "linux".to_string())
}
fn default_announce_interval_secs() -> u64 {
    4
}
fn default_device_timeout_secs() -> u64 {
    16
}
fn default_sample_interval_secs() -> u64 {
    5
}
fn default_admin_secret() -> String {
    "AMR192002".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            interface: None,
            data_dir: default_data_dir(),
            device_name: default_device_name(),
            announce_interval_secs: default_announce_interval_secs(),
            device_timeout_secs: default_device_timeout_secs(),
            sample_interval_secs: default_sample_interval_secs(),
            admin_secret: default_admin_secret(),
        }
    }
}

impl Config {
    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs(self.announce_interval_secs.max(1))
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs.max(1))
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |k| std::env::var(k).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("WIFIHOME_DISCOVERY_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.discovery_port = p;
        }
    }
    if let Some(s) = var("WIFIHOME_INTERFACE") {
        c.interface = Some(s);
    }
    if let Some(s) = var("WIFIHOME_DATA_DIR") {
        c.data_dir = PathBuf::from(s);
    }
    if let Some(s) = var("WIFIHOME_DEVICE_NAME") {
        c.device_name = s;
    }
    if let Some(s) = var("WIFIHOME_ADMIN_SECRET") {
        c.admin_secret = s;
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/wifihome/config.toml"));
    }
    out.push(PathBuf::from("/etc/wifihome/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => tracing::warn!(path = %p.display(), error = %e, "ignoring invalid config"),
                },
                Err(e) => tracing::warn!(path = %p.display(), error = %e, "cannot read config"),
            }
            break;
        }
    }
    None
}
