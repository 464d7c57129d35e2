//! jam-sync - XR jam session sync client
//!
//! Runs a local session over the loopback transport, feeds the control
//! bridge into the gesture engine and drives the sync tick.

use anyhow::Result;
use clap::Parser;
use jam_sync::bridge::ControlBridge;
use jam_sync::cli;
use jam_sync::config::{AppConfig, ConfigWatcher};
use jam_sync::pose::{ReferenceFrame, TrackingSample};
use jam_sync::session::{Participant, ParticipantId, SessionContext, SyncClient};
use jam_sync::transport::LoopbackHub;
use nalgebra::{Point3, UnitQuaternion};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// jam-sync - share instrument gestures and pose in an XR jam session
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Start the interactive console
    #[arg(long)]
    repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting jam-sync v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if !Path::new(&args.config).exists() {
        warn!("Config file not found, writing defaults to {}", args.config);
        AppConfig::default().save(&args.config).await?;
    }

    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    run_app((*initial_config).clone(), config_watcher, args.repl, shutdown_signal()).await?;

    info!("jam-sync shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    mut config_watcher: ConfigWatcher,
    repl: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let local = Participant::new(
        ParticipantId(config.session.local_id),
        config.session.display_name.clone(),
    );
    info!("Local participant {} ({})", local.display_name, local.id);

    let hub = LoopbackHub::new();
    let inbox = hub.connect(local.id);
    let context = SessionContext::new(local, ReferenceFrame::identity());
    let mut client = SyncClient::new(&config, context, hub.clone(), inbox);

    if config.bridge.enabled {
        let bridge = ControlBridge::bind(&config.bridge.listen, client.control_sender()).await?;
        tokio::spawn(async move {
            if let Err(e) = bridge.run().await {
                warn!("Control bridge stopped: {:#}", e);
            }
        });
    } else {
        info!("Control bridge disabled");
    }

    let snapshot = Arc::new(RwLock::new(client.snapshot()));

    // rustyline blocks, so the console gets its own thread
    let repl_rx = if repl {
        let (done_tx, done_rx) = oneshot::channel();
        let commands = client.command_sender();
        let control = client.control_sender();
        let snapshot = snapshot.clone();
        std::thread::Builder::new()
            .name("repl".to_string())
            .spawn(move || {
                let _ = done_tx.send(cli::run_repl(commands, control, snapshot));
            })?;
        Some(done_rx)
    } else {
        None
    };
    let repl_done = async move {
        match repl_rx {
            Some(rx) => rx.await,
            None => std::future::pending().await,
        }
    };

    let mut tick_hz = config.session.tick_hz;
    let mut interval = tick_interval(tick_hz);
    let mut last_tick = Instant::now();

    // No tracker attached: the local avatar stands still with hands untracked
    let sample = TrackingSample::body(Point3::new(0.0, 1.6, 0.0), UnitQuaternion::identity());

    info!("✅ Session running at {} Hz", tick_hz);

    tokio::pin!(shutdown);
    tokio::pin!(repl_done);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Reloaded configuration only lands between ticks
                if let Some(new_config) = config_watcher.try_latest_config() {
                    info!("📝 Configuration file changed, applying...");
                    client.reconfigure(&new_config);
                    if new_config.session.tick_hz != tick_hz {
                        tick_hz = new_config.session.tick_hz;
                        interval = tick_interval(tick_hz);
                        info!("Tick rate changed to {} Hz", tick_hz);
                    }
                }

                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f32();
                last_tick = now;

                let stats = client.tick(dt, &sample);
                if stats.reliable_applied + stats.control_events + stats.dropped > 0 {
                    debug!("Tick: {:?}", stats);
                }
                *snapshot.write() = client.snapshot();
            }

            result = &mut repl_done => {
                match result {
                    Ok(Ok(())) => info!("Console closed"),
                    Ok(Err(e)) => warn!("Console failed: {:#}", e),
                    Err(e) => warn!("Console thread ended unexpectedly: {}", e),
                }
                break;
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping tick loop");
                break;
            }
        }
    }

    hub.disconnect(client.local_id());
    Ok(())
}

fn tick_interval(tick_hz: u32) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / tick_hz.max(1) as f64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
