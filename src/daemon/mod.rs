//! Daemon module for the wellness timers.
//!
//! This module contains the core daemon functionality:
//! - `registry`: per-timer state and elapsed-time bookkeeping
//! - `timer`: timer engine, periodic check and scheduler
//! - `clock`: time sources and completion timestamp policy
//! - `ipc`: Unix socket server for commands and notification streaming
//! - `config`: daemon configuration

pub mod clock;
pub mod config;
pub mod error;
pub mod ipc;
pub mod registry;
pub mod timer;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::types::Notification;

pub use clock::{Clock, CompletionStamp, ManualClock, SystemClock};
pub use config::DaemonConfig;
pub use error::TimerError;
pub use ipc::{IpcServer, RequestHandler};
pub use registry::{TimerRegistry, TimerState};
pub use timer::TimerEngine;

/// Capacity of the per-watcher notification buffer.
const NOTIFICATION_BUFFER: usize = 64;

/// Runs the daemon until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the socket cannot be bound.
pub async fn run(config: DaemonConfig) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;

    let server = IpcServer::new(&config.socket_path)?;
    tracing::info!(socket = ?server.socket_path(), "daemon listening");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Notification>();
    let (notify_tx, _) = broadcast::channel::<Notification>(NOTIFICATION_BUFFER);

    let engine = Arc::new(Mutex::new(TimerEngine::new(config.stamp.clone(), event_tx)));
    let handler = RequestHandler::new(engine.clone(), notify_tx.clone());

    let scheduler = tokio::spawn(TimerEngine::run(engine, config.tick_interval));

    let forwarder = tokio::spawn(async move {
        while let Some(notification) = event_rx.recv().await {
            if let Notification::Complete { timer_type, time } = &notification {
                tracing::info!(timer = %timer_type, %time, "timer complete");
            }
            // No watchers is fine
            let _ = notify_tx.send(notification);
        }
    });

    let accept_loop = async {
        loop {
            match server.accept().await {
                Ok(stream) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handler.serve(stream).await {
                            tracing::warn!("request failed: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::error!("{:#}", e),
            }
        }
    };

    tokio::select! {
        _ = accept_loop => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            tracing::info!("shutting down");
        }
    }

    scheduler.abort();
    forwarder.abort();

    Ok(())
}
