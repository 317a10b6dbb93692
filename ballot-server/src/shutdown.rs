//! Signal handling for graceful shutdown and config reload.

use crate::config::ConfigLoader;
use ballot_core::config::{BallotConfig, ConfigStore};
use ballot_core::utils::retry::shutdown_requested;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
    Ok(())
}

/// Spawns a task that raises the shutdown flag on SIGTERM or SIGINT.
pub fn spawn_shutdown_listener(shutdown_tx: Arc<watch::Sender<bool>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to install shutdown signal handlers: {}", e);
            }
        }
    })
}

/// Spawns a task that listens for SIGHUP and reloads the ballot labels.
///
/// Only the `[ballot]` section is applied live. Everything else needs a
/// restart.
pub fn spawn_config_reload_handler(
    ballot: ConfigStore<BallotConfig>,
    config_loader: Arc<ConfigLoader>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!("Failed to install SIGHUP handler: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown_rx) => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            if *ballot.current() == loaded_config.ballot {
                                tracing::info!("Ballot labels unchanged");
                            } else {
                                ballot.update(loaded_config.ballot);
                                tracing::info!("Configuration reloaded successfully");
                            }
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
            }
        }
    })
}
