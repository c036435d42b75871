//! LAN discovery: UDP broadcast of our usage announcement, listen for others' announcements,
//! forward them to the actor as events.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use wifihome_core::wire::{decode_frame, encode_frame};
use wifihome_core::{Discovery, Message, PROTOCOL_VERSION};

use crate::actor::Event;

/// Whether we announce ourselves or only collect others' announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    BroadcastAndListen,
    ListenOnly,
}

/// Running broadcast and listen tasks. Stopping aborts the task, which closes its socket
/// handle; the socket itself closes once both tasks are gone.
#[derive(Debug, Default)]
pub struct DiscoveryHandle {
    broadcast: Option<JoinHandle<()>>,
    listen: Option<JoinHandle<()>>,
}

impl DiscoveryHandle {
    /// Handle with nothing running, for one-shot commands.
    pub fn idle() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_broadcasting(&self) -> bool {
        self.broadcast.as_ref().is_some_and(|h| !h.is_finished())
    }

    #[cfg(test)]
    pub fn is_listening(&self) -> bool {
        self.listen.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Discovery for DiscoveryHandle {
    fn stop_broadcasting(&mut self) {
        if let Some(h) = self.broadcast.take() {
            h.abort();
        }
    }

    fn stop_listening(&mut self) {
        if let Some(h) = self.listen.take() {
            h.abort();
        }
    }
}

/// Bind the discovery port and spawn the loops. `announce` carries the latest announcement
/// (`None` until the actor has published one).
pub async fn start_discovery(
    port: u16,
    device_id: String,
    interval: Duration,
    mode: Mode,
    announce: watch::Receiver<Option<Message>>,
    events: mpsc::UnboundedSender<Event>,
) -> std::io::Result<DiscoveryHandle> {
    let socket = Arc::new(make_broadcast_socket(port)?);
    let dest = SocketAddr::from((Ipv4Addr::BROADCAST, port));

    let broadcast = match mode {
        Mode::BroadcastAndListen => {
            let socket = socket.clone();
            let events = events.clone();
            Some(tokio::spawn(async move {
                broadcast_loop(socket, dest, interval, announce, events).await
            }))
        }
        Mode::ListenOnly => None,
    };
    let listen = Some(tokio::spawn(async move {
        listen_loop(socket, device_id, events).await
    }));
    tracing::info!(port, ?mode, "discovery started");
    Ok(DiscoveryHandle { broadcast, listen })
}

fn make_broadcast_socket(port: u16) -> std::io::Result<UdpSocket> {
    let std_sock = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
    std_sock.set_broadcast(true)?;
    std_sock.set_nonblocking(true)?;
    UdpSocket::from_std(std_sock)
}

async fn broadcast_loop(
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    interval: Duration,
    mut announce: watch::Receiver<Option<Message>>,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let Some(msg) = announce.borrow_and_update().clone() else {
            continue;
        };
        let frame = match encode_frame(&msg) {
            Ok(f) => f,
            Err(e) => {
                let _ = events.send(Event::DiscoveryError(e.to_string()));
                continue;
            }
        };
        if let Err(e) = socket.send_to(&frame, dest).await {
            let _ = events.send(Event::DiscoveryError(format!("broadcast failed: {e}")));
        }
    }
}

/// Pause after a failed receive so a persistent error does not spin.
const RECV_RETRY: Duration = Duration::from_secs(1);

async fn listen_loop(
    socket: Arc<UdpSocket>,
    my_id: String,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut buf = vec![0u8; 65536];
    loop {
        let (n, from) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                if !report_listen_error(&events, &e) {
                    return;
                }
                tokio::time::sleep(RECV_RETRY).await;
                continue;
            }
        };
        let Some(msg) = accept_datagram(&buf[..n], &my_id) else {
            tracing::trace!(%from, "ignored datagram");
            continue;
        };
        let device = msg.into_device(chrono::Utc::now());
        if events.send(Event::DeviceDiscovered(device)).is_err() {
            return;
        }
    }
}

/// Forward a receive error to the actor. Returns whether listening should go on, which is
/// as long as anyone still receives events.
fn report_listen_error(events: &mpsc::UnboundedSender<Event>, e: &std::io::Error) -> bool {
    tracing::warn!(error = %e, "discovery receive failed");
    events
        .send(Event::DiscoveryError(format!("listen failed: {e}")))
        .is_ok()
}

/// Decode a datagram; drop undecodable ones, other protocol versions, and our own echo.
fn accept_datagram(bytes: &[u8], my_id: &str) -> Option<Message> {
    let (msg, _) = decode_frame(bytes).ok()?;
    match &msg {
        Message::Announce {
            protocol_version,
            device_id,
            ..
        } => {
            if *protocol_version != PROTOCOL_VERSION || device_id == my_id {
                return None;
            }
        }
    }
    Some(msg)
}
