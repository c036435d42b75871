// WifiHome Linux: Wi-Fi usage tracker, LAN discovery daemon, and CLI.

mod actor;
mod config;
mod discovery;
mod prompt;
mod storage;
mod tracker;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use wifihome_core::{format_bytes, PageController, Services, TracingErrorLogger, WipeOutcome};

use crate::actor::{ActorSettings, Event, UsageActor};
use crate::discovery::{DiscoveryHandle, Mode};
use crate::prompt::TerminalPrompter;
use crate::storage::JsonStore;
use crate::tracker::{InterfaceSource, UsageSampler, WifiTracker};

/// Track Wi-Fi data usage and discover devices on the local network.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon: sample usage, announce it, and collect other devices
    Run,
    /// Show tracking status and usage
    Status,
    /// Start tracking if stopped, stop it if running
    Toggle,
    /// Print the usage summary
    Usage,
    /// List devices seen on the network
    Devices,
    /// Wipe all usage data (asks for the admin password)
    Wipe {
        /// Admin password; prompted for when omitted
        #[arg(long)]
        secret: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Listen for devices without announcing (asks for the admin password)
    Host {
        #[arg(long)]
        secret: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load();
    tracing::debug!(?cfg, "config loaded");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(&cfg, Mode::BroadcastAndListen),
        Command::Status => {
            let c = one_shot(&cfg)?;
            println!("{}", c.status_message());
            if c.is_stats_visible() {
                println!("{}", c.usage_summary());
            }
            Ok(())
        }
        Command::Toggle => {
            let mut c = one_shot(&cfg)?;
            println!("{}", toggle(&mut c)?);
            Ok(())
        }
        Command::Usage => {
            let mut c = one_shot(&cfg)?;
            println!("{}", c.show_usage());
            Ok(())
        }
        Command::Devices => {
            let c = one_shot(&cfg)?;
            for d in c.devices() {
                println!(
                    "{}\t{}\t{}\t{}",
                    d.device_name,
                    if d.is_online { "online" } else { "offline" },
                    format_bytes(d.total_bytes),
                    d.last_seen.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                );
            }
            Ok(())
        }
        Command::Wipe { secret, yes } => {
            let mut c = one_shot(&cfg)?;
            let mut prompter = TerminalPrompter::stdin(secret, yes);
            match c.wipe_data(&mut prompter) {
                WipeOutcome::Wiped => println!("Usage data wiped"),
                WipeOutcome::WrongSecret => anyhow::bail!("wrong password"),
                WipeOutcome::Failed => anyhow::bail!("wipe failed; see log"),
                WipeOutcome::Cancelled | WipeOutcome::Declined => println!("Cancelled"),
            }
            Ok(())
        }
        Command::Host { secret } => {
            let mut c = one_shot(&cfg)?;
            let mut prompter = TerminalPrompter::stdin(secret, false);
            if !c.enter_host_mode(&mut prompter) {
                anyhow::bail!("host mode denied");
            }
            drop(c);
            run_daemon(&cfg, Mode::ListenOnly)
        }
    }
}

/// Toggle tracking and return the new status line; a failed toggle is an error exit.
fn toggle(c: &mut PageController) -> anyhow::Result<&'static str> {
    c.toggle_tracking().context("could not toggle tracking; see log")?;
    Ok(c.status_message())
}

fn services(cfg: &config::Config, store: JsonStore, discovery: DiscoveryHandle) -> Services {
    let source = InterfaceSource::new(cfg.interface.clone());
    Services {
        tracker: Box::new(WifiTracker::new(store.dir(), source)),
        discovery: Box::new(discovery),
        storage: Box::new(store),
        logger: Box::new(TracingErrorLogger),
    }
}

fn one_shot(cfg: &config::Config) -> anyhow::Result<PageController> {
    let store = JsonStore::open(&cfg.data_dir)
        .with_context(|| format!("opening data dir {}", cfg.data_dir.display()))?;
    Ok(PageController::new(
        services(cfg, store, DiscoveryHandle::idle()),
        cfg.admin_secret.clone(),
    ))
}

fn run_daemon(cfg: &config::Config, mode: Mode) -> anyhow::Result<()> {
    let store = JsonStore::open(&cfg.data_dir)
        .with_context(|| format!("opening data dir {}", cfg.data_dir.display()))?;
    let device_id = store.device_id()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (announce_tx, announce_rx) = watch::channel(None);
        let discovery = discovery::start_discovery(
            cfg.discovery_port,
            device_id.clone(),
            cfg.announce_interval(),
            mode,
            announce_rx,
            events_tx.clone(),
        )
        .await
        .with_context(|| format!("binding discovery port {}", cfg.discovery_port))?;

        let controller = PageController::new(
            services(cfg, store, discovery),
            cfg.admin_secret.clone(),
        );
        let sampler = match mode {
            Mode::BroadcastAndListen => {
                Some(UsageSampler::new(InterfaceSource::new(cfg.interface.clone())))
            }
            Mode::ListenOnly => None,
        };
        let actor = UsageActor::new(
            controller,
            sampler,
            announce_tx,
            ActorSettings {
                device_id,
                device_name: cfg.device_name.clone(),
                sample_interval: cfg.sample_interval(),
                device_timeout: cfg.device_timeout(),
                host_mode: mode == Mode::ListenOnly,
            },
        );
        let actor_task = tokio::spawn(actor.run(events_rx));
        #[cfg(unix)]
        tokio::spawn(control_signals(events_tx.clone()));

        shutdown_signal().await?;
        tracing::info!("shutting down");
        let _ = events_tx.send(Event::Shutdown);
        actor_task.await?;
        Ok::<(), anyhow::Error>(())
    })
}

/// SIGUSR1 toggles tracking; SIGHUP reloads state from storage.
#[cfg(unix)]
async fn control_signals(events: mpsc::UnboundedSender<Event>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut hup = signal(SignalKind::hangup())?;
    loop {
        let event = tokio::select! {
            _ = usr1.recv() => Event::ToggleTracking,
            _ = hup.recv() => Event::Appearing,
        };
        if events.send(event).is_err() {
            return Ok(());
        }
    }
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
