//! IPC Client for communicating with the restwell daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Notification streaming for `watch`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::daemon::config::default_socket_path;
use crate::types::{
    IpcRequest, IpcResponse, Notification, PauseParams, ResetParams, StartParams, TimerKind,
};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with the default socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_socket_path(default_socket_path()?))
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Sends a start command to the daemon.
    pub async fn start(&self, timer: TimerKind, length_ms: Option<u64>) -> Result<IpcResponse> {
        let request = IpcRequest::Start(StartParams {
            timer_type: timer,
            timer_length: length_ms,
        });
        self.send_request_with_retry(&request).await
    }

    /// Sends a pause command to the daemon.
    pub async fn pause(&self, timer: TimerKind) -> Result<IpcResponse> {
        let request = IpcRequest::Pause(PauseParams { timer_type: timer });
        self.send_request_with_retry(&request).await
    }

    /// Sends a reset command for one or more timers.
    pub async fn reset(&self, timers: Vec<TimerKind>) -> Result<IpcResponse> {
        let request = IpcRequest::Reset(ResetParams {
            timer_type: timers.into(),
        });
        self.send_request_with_retry(&request).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Status).await
    }

    /// Subscribes to notifications and hands each one to `on_notification`.
    ///
    /// Returns when the daemon closes the connection.
    pub async fn watch<F>(&self, mut on_notification: F) -> Result<()>
    where
        F: FnMut(Notification),
    {
        let (response, mut lines) = self.open(&IpcRequest::Watch).await?;
        if response.is_error() {
            anyhow::bail!("{}", response.message);
        }

        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read notification")?
        {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Notification>(&line) {
                Ok(notification) => on_notification(notification),
                Err(e) => tracing::warn!("ignoring malformed notification: {}", e),
            }
        }

        Ok(())
    }

    /// Sends a request to the daemon with retry logic.
    ///
    /// Only transport failures are retried; an error response is returned
    /// as an error immediately.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut attempt = 1;

        loop {
            match self.send_request(request).await {
                Ok(response) if response.is_error() => anyhow::bail!("{}", response.message),
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("Request failed (attempt {}/{}): {:#}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let (response, _lines) = self.open(request).await?;
        Ok(response)
    }

    /// Connects, sends the request and reads the first response line.
    async fn open(&self, request: &IpcRequest) -> Result<(IpcResponse, Lines<BufReader<UnixStream>>)> {
        let mut stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timed out")?
            .context("Cannot connect to the daemon. Start it with 'restwell daemon'")?;

        let request_json = serde_json::to_string(request).context("Failed to serialize request")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(request_json.as_bytes()),
        )
        .await
        .context("Write timed out")?
        .context("Failed to send request")?;

        // Shutdown write side to signal end of request
        stream.shutdown().await.context("Failed to shut down write side")?;

        let mut lines = BufReader::new(stream).lines();
        let line = timeout(Duration::from_secs(IO_TIMEOUT_SECS), lines.next_line())
            .await
            .context("Read timed out")?
            .context("Failed to receive response")?
            .context("The daemon closed the connection without responding")?;

        let response: IpcResponse =
            serde_json::from_str(&line).context("Failed to parse response")?;

        Ok((response, lines))
    }
}

// ============================================================================
// Tests
// ============================================================================
