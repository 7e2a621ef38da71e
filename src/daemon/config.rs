//! Daemon configuration.
//!
//! Built from command-line flags; nothing is read from disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::time::Duration;

use super::clock::CompletionStamp;
use super::timer::DEFAULT_TICK_INTERVAL;

/// Socket path relative to the home directory.
pub const DEFAULT_SOCKET_PATH: &str = ".restwell/restwell.sock";

/// Accepted tick interval range in milliseconds.
const TICK_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=60_000;

/// Configuration for the timer daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Unix socket the daemon listens on
    pub socket_path: PathBuf,
    /// Interval between timer checks
    pub tick_interval: Duration,
    /// Completion timestamp policy
    pub stamp: CompletionStamp,
}

impl DaemonConfig {
    /// Creates a configuration with defaults for everything but the socket.
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            tick_interval: DEFAULT_TICK_INTERVAL,
            stamp: CompletionStamp::default(),
        }
    }

    /// Sets the tick interval.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Sets the completion timestamp policy.
    pub fn with_stamp(mut self, stamp: CompletionStamp) -> Self {
        self.stamp = stamp;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        let tick_ms = self.tick_interval.as_millis();
        if !TICK_INTERVAL_RANGE_MS.contains(&u64::try_from(tick_ms).unwrap_or(u64::MAX)) {
            return Err(format!(
                "tick interval must be between {} and {} ms",
                TICK_INTERVAL_RANGE_MS.start(),
                TICK_INTERVAL_RANGE_MS.end()
            ));
        }
        self.stamp.validate()
    }
}

/// Returns the default socket path under the user's home directory.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_socket_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine the home directory")?;
    Ok(home.join(DEFAULT_SOCKET_PATH))
}
