//! The controller actor: one task owns the `PageController`. Discovery events, lifecycle
//! events, and timer ticks are handled one at a time, so controller state needs no locks.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use wifihome_core::{format_bytes, ConnectedDevice, Message, PageController, PROTOCOL_VERSION};

use crate::tracker::UsageSampler;

/// Messages for the actor. Any task may send; only the actor touches state.
#[derive(Debug)]
pub enum Event {
    DeviceDiscovered(ConnectedDevice),
    DiscoveryError(String),
    ToggleTracking,
    Appearing,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct ActorSettings {
    pub device_id: String,
    pub device_name: String,
    pub sample_interval: Duration,
    pub device_timeout: Duration,
    /// Host mode logs the device table on every sweep.
    pub host_mode: bool,
}

pub struct UsageActor {
    controller: PageController,
    sampler: Option<UsageSampler>,
    announce: watch::Sender<Option<Message>>,
    settings: ActorSettings,
}

impl UsageActor {
    pub fn new(
        controller: PageController,
        sampler: Option<UsageSampler>,
        announce: watch::Sender<Option<Message>>,
        settings: ActorSettings,
    ) -> Self {
        Self {
            controller,
            sampler,
            announce,
            settings,
        }
    }

    /// Run until `Shutdown` or every sender is gone; discovery is stopped on the way out.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) -> PageController {
        self.controller.on_appearing();
        self.publish();

        let mut sample = tokio::time::interval(self.settings.sample_interval);
        let sweep_every = (self.settings.device_timeout / 4).max(Duration::from_secs(1));
        let mut sweep = tokio::time::interval(sweep_every);
        loop {
            tokio::select! {
                ev = events.recv() => match ev {
                    None | Some(Event::Shutdown) => break,
                    Some(ev) => self.handle(ev),
                },
                _ = sample.tick() => self.sample(),
                _ = sweep.tick() => self.sweep(),
            }
        }
        self.controller.on_disappearing();
        tracing::info!("actor stopped");
        self.controller
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::DeviceDiscovered(device) => {
                self.controller.on_device_discovered(device, Utc::now());
            }
            Event::DiscoveryError(message) => self.controller.on_discovery_error(message),
            Event::ToggleTracking => {
                if let Some(tracking) = self.controller.toggle_tracking() {
                    tracing::info!(status = self.controller.status_message(), tracking);
                }
                self.publish();
            }
            Event::Appearing => {
                self.controller.on_appearing();
                self.publish();
            }
            Event::Shutdown => {}
        }
    }

    /// Pick up changes made by other processes, then add the counter delta if tracking.
    pub fn sample(&mut self) {
        self.controller.load();
        let Some(sampler) = self.sampler.as_mut() else {
            return;
        };
        // Sample even when stopped so the baseline stays current.
        match sampler.sample() {
            Ok((down, up)) => {
                if (down, up) != (0, 0)
                    && self
                        .controller
                        .record_sample(&self.settings.device_name, down, up, Utc::now())
                {
                    tracing::debug!(down, up, total = %self.controller.total_text(), "usage sampled");
                }
            }
            Err(e) => tracing::debug!(error = %e, "usage sample skipped"),
        }
        self.publish();
    }

    pub fn sweep(&mut self) {
        let flipped = self
            .controller
            .sweep_devices(Utc::now(), self.settings.device_timeout);
        if flipped > 0 {
            tracing::info!(flipped, "devices went offline");
        }
        if self.settings.host_mode {
            for d in self.controller.devices() {
                tracing::info!(
                    device = %d.device_name,
                    online = d.is_online,
                    download = %format_bytes(d.download_bytes),
                    upload = %format_bytes(d.upload_bytes),
                    total = %format_bytes(d.total_bytes),
                    "device"
                );
            }
        }
    }

    /// Latest announcement for the broadcaster.
    fn publish(&self) {
        let snapshot = self.controller.snapshot().cloned().unwrap_or_default();
        let device_name = if snapshot.device_name.is_empty() {
            self.settings.device_name.clone()
        } else {
            snapshot.device_name
        };
        self.announce.send_replace(Some(Message::Announce {
            protocol_version: PROTOCOL_VERSION,
            device_id: self.settings.device_id.clone(),
            device_name,
            download_bytes: snapshot.download_bytes,
            upload_bytes: snapshot.upload_bytes,
            total_bytes: snapshot.total_bytes,
        }));
    }

    #[cfg(test)]
    pub fn controller(&self) -> &PageController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryHandle;
    use crate::storage::JsonStore;
    use crate::tracker::{FakeCounters, InterfaceSource, WifiTracker};
    use wifihome_core::{Services, Storage, TracingErrorLogger};

    struct Fixture {
        dir: tempfile::TempDir,
        counters: FakeCounters,
        announce_rx: watch::Receiver<Option<Message>>,
        actor: UsageActor,
    }

    fn source(dir: &std::path::Path, counters: &FakeCounters) -> InterfaceSource {
        InterfaceSource::with_counters(None, counters.clone(), dir.join("wireless"))
    }

    fn fixture(host_mode: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let counters = FakeCounters::default();
        counters.set("wlan0", 0, 0);
        let controller = PageController::new(
            Services {
                tracker: Box::new(WifiTracker::new(dir.path(), source(dir.path(), &counters))),
                discovery: Box::new(DiscoveryHandle::idle()),
                storage: Box::new(JsonStore::open(dir.path()).unwrap()),
                logger: Box::new(TracingErrorLogger),
            },
            "secret",
        );
        let (announce_tx, announce_rx) = watch::channel(None);
        let actor = UsageActor::new(
            controller,
            Some(UsageSampler::new(source(dir.path(), &counters))),
            announce_tx,
            ActorSettings {
                device_id: "self-id".into(),
                device_name: "desk".into(),
                sample_interval: Duration::from_secs(3600),
                device_timeout: Duration::from_secs(16),
                host_mode,
            },
        );
        Fixture {
            dir,
            counters,
            announce_rx,
            actor,
        }
    }

    fn stored_ids(dir: &std::path::Path) -> Vec<String> {
        JsonStore::open(dir)
            .unwrap()
            .load_connected_devices()
            .unwrap()
            .into_iter()
            .map(|d| d.device_id)
            .collect()
    }

    fn peer(id: &str, total: u64) -> ConnectedDevice {
        ConnectedDevice {
            device_id: id.into(),
            device_name: id.into(),
            download_bytes: total,
            upload_bytes: 0,
            total_bytes: total,
            last_seen: Utc::now(),
            is_online: true,
        }
    }

    #[test]
    fn tracked_samples_accumulate_and_are_announced() {
        let mut f = fixture(false);
        f.actor.handle(Event::ToggleTracking);
        assert!(f.actor.controller().is_tracking());

        f.actor.sample();
        f.counters.set("wlan0", 2048, 1024);
        f.actor.sample();

        let stored = JsonStore::open(f.dir.path())
            .unwrap()
            .load_usage_data()
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_bytes, 3072);
        assert_eq!(stored.device_name, "desk");

        let announced = f.announce_rx.borrow().clone();
        match announced {
            Some(Message::Announce {
                device_id,
                total_bytes,
                ..
            }) => {
                assert_eq!(device_id, "self-id");
                assert_eq!(total_bytes, 3072);
            }
            None => panic!("nothing announced"),
        }
    }

    #[test]
    fn stopped_tracker_ignores_traffic() {
        let mut f = fixture(false);
        f.actor.sample();
        f.counters.set("wlan0", 5000, 5000);
        f.actor.sample();
        assert!(!f.actor.controller().is_stats_visible());
    }

    #[test]
    fn external_stop_is_picked_up_on_sample() {
        let mut f = fixture(false);
        f.actor.handle(Event::ToggleTracking);
        std::fs::remove_file(f.dir.path().join("tracking")).unwrap();
        f.actor.sample();
        assert!(!f.actor.controller().is_tracking());
    }

    #[test]
    fn wipe_from_another_process_is_not_undone() {
        let mut f = fixture(false);
        f.actor.handle(Event::DeviceDiscovered(peer("A", 1)));
        f.actor.handle(Event::DeviceDiscovered(peer("B", 1)));
        assert_eq!(stored_ids(f.dir.path()), vec!["A", "B"]);

        JsonStore::open(f.dir.path()).unwrap().reset_data().unwrap();
        f.actor.sample();
        assert!(f.actor.controller().devices().is_empty());

        f.actor.handle(Event::DeviceDiscovered(peer("C", 1)));
        assert_eq!(stored_ids(f.dir.path()), vec!["C"]);
    }

    #[test]
    fn sweep_marks_silent_peers_offline() {
        let mut f = fixture(true);
        let mut old = peer("old", 1);
        old.last_seen = Utc::now() - chrono::Duration::seconds(60);
        f.actor.handle(Event::DeviceDiscovered(peer("fresh", 1)));
        f.actor
            .controller
            .on_device_discovered(old, Utc::now() - chrono::Duration::seconds(60));
        f.actor.sweep();
        let online: Vec<_> = f
            .actor
            .controller()
            .devices()
            .iter()
            .map(|d| (d.device_id.as_str(), d.is_online))
            .collect();
        assert_eq!(online, vec![("fresh", true), ("old", false)]);
    }

    #[tokio::test]
    async fn run_handles_events_until_shutdown() {
        let f = fixture(false);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(f.actor.run(rx));
        tx.send(Event::DeviceDiscovered(peer("A", 10))).unwrap();
        tx.send(Event::DeviceDiscovered(peer("B", 10))).unwrap();
        tx.send(Event::DeviceDiscovered(peer("A", 20))).unwrap();
        tx.send(Event::DiscoveryError("boom".into())).unwrap();
        tx.send(Event::Shutdown).unwrap();
        let controller = task.await.unwrap();

        let ids: Vec<_> = controller.devices().iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(controller.devices()[0].total_bytes, 20);
        let stored = JsonStore::open(f.dir.path())
            .unwrap()
            .load_connected_devices()
            .unwrap();
        assert_eq!(stored.len(), 2);
    }
}
