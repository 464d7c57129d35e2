//! Hot reload of the configuration file
//!
//! File events only signal a background reload task. The task coalesces a
//! burst of events, re-reads and validates the file and publishes the result
//! on a watch channel. The session polls that channel at a tick boundary so
//! gesture thresholds never change in the middle of a tick. A file that fails
//! to parse or validate is logged and the previously published config stays.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Quiet period after the last file event before the file is read
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the config file and hands validated reloads to the tick loop
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: watch::Receiver<Arc<AppConfig>>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let initial_config = Arc::new(
            AppConfig::load(&config_path)
                .await
                .context("Failed to load initial config")?,
        );

        let (config_tx, config_rx) = watch::channel(initial_config.clone());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        tokio::spawn(reload_loop(config_path.clone(), signal_rx, config_tx));

        // notify callbacks run on their own OS thread; an unbounded send needs no runtime
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                debug!("Config file event: {:?}", event.paths);
                if signal_tx.send(()).is_err() {
                    debug!("Config reload task has stopped");
                }
            }
            Ok(_) => {}
            Err(e) => error!("Watch error: {}", e),
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx: config_rx,
            },
            initial_config,
        ))
    }

    /// Most recent validated reload not yet taken, without waiting
    pub fn try_latest_config(&mut self) -> Option<AppConfig> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        Some((**self.rx.borrow_and_update()).clone())
    }
}

async fn reload_loop(
    config_path: String,
    mut signals: mpsc::UnboundedReceiver<()>,
    publish: watch::Sender<Arc<AppConfig>>,
) {
    while signals.recv().await.is_some() {
        tokio::time::sleep(RELOAD_DEBOUNCE).await;
        while signals.try_recv().is_ok() {}

        match AppConfig::load(&config_path).await {
            Ok(config) => {
                if **publish.borrow() == config {
                    debug!("Config file touched without changes");
                    continue;
                }
                info!("Configuration reloaded successfully");
                if publish.send(Arc::new(config)).is_err() {
                    debug!("Config watcher dropped, stopping reload task");
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to reload config (keeping previous config): {:#}", e);
            }
        }
    }
}
