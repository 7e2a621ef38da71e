//! IPC server for the timer daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer commands
//! - Notification streaming for `watch` connections

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt, Interest};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{timeout, Duration};

use crate::types::{
    IpcRequest, IpcResponse, Notification, PauseParams, ResetParams, ResponseData, StartParams,
};

use super::timer::TimerEngine;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

/// How often an idle watch connection is checked for a hung-up peer
const WATCH_LIVENESS_INTERVAL_MS: u64 = 250;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Client closed the connection without sending anything
    #[error("Connection closed by client")]
    ConnectionClosed,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client half-closes its side, with a read timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(256);
        let mut limited = (&mut *stream).take(MAX_REQUEST_SIZE as u64 + 1);

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        }

        if buffer.is_empty() {
            return Err(IpcError::ConnectionClosed.into());
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest =
            serde_json::from_slice(&buffer).context("Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        write_line(stream, response).await
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn write_line<T: serde::Serialize>(stream: &mut UnixStream, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec(value).context("Failed to serialize message")?;
    json.push(b'\n');

    stream
        .write_all(&json)
        .await
        .context("Failed to write message")?;
    stream.flush().await.context("Failed to flush message")?;

    Ok(())
}

/// Resolves once the peer has fully closed the connection.
async fn peer_closed(stream: &UnixStream) {
    loop {
        match stream.ready(Interest::WRITABLE).await {
            Ok(ready) if !ready.is_write_closed() => {}
            _ => return,
        }
        tokio::time::sleep(Duration::from_millis(WATCH_LIVENESS_INTERVAL_MS)).await;
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the TimerEngine.
#[derive(Clone)]
pub struct RequestHandler {
    /// Shared reference to the timer engine
    engine: Arc<Mutex<TimerEngine>>,
    /// Fan-out of notifications for watching clients
    notifications: broadcast::Sender<Notification>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(
        engine: Arc<Mutex<TimerEngine>>,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            engine,
            notifications,
        }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Start(params) => self.handle_start(params).await,
            IpcRequest::Pause(params) => self.handle_pause(params).await,
            IpcRequest::Reset(params) => self.handle_reset(params).await,
            IpcRequest::Status => self.handle_status().await,
            IpcRequest::Watch => IpcResponse::success("Watching timers", None),
        }
    }

    /// Serves one client connection end to end.
    ///
    /// For `watch` requests the connection stays open and receives every
    /// notification as a JSON line until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be read or a write fails.
    pub async fn serve(&self, mut stream: UnixStream) -> Result<()> {
        let request = match IpcServer::receive_request(&mut stream).await {
            Ok(request) => request,
            Err(e) => {
                let response = IpcResponse::error(format!("Invalid request: {:#}", e));
                IpcServer::send_response(&mut stream, &response).await?;
                return Err(e);
            }
        };
        tracing::debug!(?request, "received request");

        if request == IpcRequest::Watch {
            // Subscribe before acknowledging so no notification is missed
            let subscription = self.notifications.subscribe();
            let response = self.handle(request).await;
            IpcServer::send_response(&mut stream, &response).await?;
            return Self::stream_notifications(&mut stream, subscription).await;
        }

        let response = self.handle(request).await;
        IpcServer::send_response(&mut stream, &response).await
    }

    async fn stream_notifications(
        stream: &mut UnixStream,
        mut subscription: broadcast::Receiver<Notification>,
    ) -> Result<()> {
        loop {
            // The request side is already half-closed, so reads cannot tell a
            // hang-up apart; watch for the write side closing instead.
            let received = tokio::select! {
                received = subscription.recv() => received,
                () = peer_closed(stream) => {
                    tracing::debug!("watcher disconnected");
                    return Ok(());
                }
            };

            match received {
                Ok(notification) => {
                    if let Err(e) = write_line(stream, &notification).await {
                        tracing::debug!("watcher disconnected: {:#}", e);
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watcher lagging, skipped notifications");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    /// Handles the start command.
    async fn handle_start(&self, params: StartParams) -> IpcResponse {
        let mut engine = self.engine.lock().await;

        match engine.start(params.timer_type, params.timer_length) {
            Ok(()) => IpcResponse::success(
                format!("Started {}", params.timer_type),
                Some(ResponseData {
                    timers: engine.snapshot(),
                }),
            ),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the pause command.
    async fn handle_pause(&self, params: PauseParams) -> IpcResponse {
        let mut engine = self.engine.lock().await;

        match engine.pause(params.timer_type) {
            Ok(()) => IpcResponse::success(
                format!("Paused {}", params.timer_type),
                Some(ResponseData {
                    timers: engine.snapshot(),
                }),
            ),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the reset command.
    async fn handle_reset(&self, params: ResetParams) -> IpcResponse {
        let kinds = params.timer_type.kinds();
        if kinds.is_empty() {
            tracing::debug!("rejecting reset without timers");
            return IpcResponse::error("Reset needs at least one timer");
        }

        let mut engine = self.engine.lock().await;
        engine.reset(&kinds);

        let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        IpcResponse::success(
            format!("Reset {}", names.join(", ")),
            Some(ResponseData {
                timers: engine.snapshot(),
            }),
        )
    }

    /// Handles the status command.
    async fn handle_status(&self) -> IpcResponse {
        let engine = self.engine.lock().await;

        IpcResponse::success(
            "",
            Some(ResponseData {
                timers: engine.snapshot(),
            }),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;

    use crate::daemon::clock::{CompletionStamp, ManualClock};
    use crate::types::{CompletedAt, TimerKind, TimerPhase, TimerSelection};

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_handler() -> (RequestHandler, Arc<ManualClock>, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let clock = Arc::new(ManualClock::new(0));
        let engine = TimerEngine::with_clock(clock.clone(), CompletionStamp::Epoch, tx);
        let (notify_tx, _) = broadcast::channel(16);
        let handler = RequestHandler::new(Arc::new(Mutex::new(engine)), notify_tx);
        (handler, clock, rx)
    }

    async fn send_raw(path: &Path, request: &str) -> UnixStream {
        let mut stream = UnixStream::connect(path).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        stream
    }

    // ------------------------------------------------------------------------
    // IpcServer Tests
    // ------------------------------------------------------------------------

    mod ipc_server_tests {
        use super::*;

        #[tokio::test]
        async fn test_server_creation() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path);

            assert!(server.is_ok());
            assert!(socket_path.exists());
        }

        #[tokio::test]
        async fn test_server_removes_existing_socket() {
            let socket_path = create_temp_socket_path();
            std::fs::write(&socket_path, "stale").unwrap();

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
        }

        #[tokio::test]
        async fn test_server_creates_parent_directory() {
            let dir = tempfile::tempdir().unwrap();
            let socket_path = dir.path().join("subdir").join("test.sock");

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
            assert!(socket_path.parent().unwrap().exists());
        }

        #[tokio::test]
        async fn test_receive_request_reset_many() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client = tokio::spawn(async move {
                send_raw(
                    &client_path,
                    r#"{"action":"reset","data":{"timerType":["standUp","break"]}}"#,
                )
                .await
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await.unwrap();
            assert_eq!(
                request,
                IpcRequest::Reset(ResetParams {
                    timer_type: vec![TimerKind::StandUp, TimerKind::Break].into(),
                })
            );

            client.await.unwrap();
        }

        #[tokio::test]
        async fn test_receive_request_invalid_json() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client =
                tokio::spawn(async move { send_raw(&client_path, "not valid json").await });

            let mut stream = server.accept().await.unwrap();
            assert!(IpcServer::receive_request(&mut stream).await.is_err());
        }

        #[tokio::test]
        async fn test_receive_request_too_large() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client = tokio::spawn(async move {
                let payload = "x".repeat(MAX_REQUEST_SIZE + 10);
                send_raw(&client_path, &payload).await
            });

            let mut stream = server.accept().await.unwrap();
            let err = IpcServer::receive_request(&mut stream).await.unwrap_err();
            assert!(err.to_string().contains("too large"));
        }

        #[tokio::test]
        async fn test_connection_closed() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client = tokio::spawn(async move {
                let stream = UnixStream::connect(&client_path).await.unwrap();
                drop(stream);
            });

            let mut stream = server.accept().await.unwrap();
            let err = IpcServer::receive_request(&mut stream).await.unwrap_err();
            assert!(err.to_string().contains("closed"));
        }

        #[tokio::test]
        async fn test_server_drop_cleanup() {
            let socket_path = create_temp_socket_path();

            {
                let server = IpcServer::new(&socket_path).unwrap();
                assert_eq!(server.socket_path(), socket_path);
                assert!(socket_path.exists());
            }

            assert!(!socket_path.exists());
        }
    }

    // ------------------------------------------------------------------------
    // RequestHandler Tests
    // ------------------------------------------------------------------------

    mod request_handler_tests {
        use super::*;

        fn start(kind: TimerKind, length: Option<u64>) -> IpcRequest {
            IpcRequest::Start(StartParams {
                timer_type: kind,
                timer_length: length,
            })
        }

        #[tokio::test]
        async fn test_handle_status() {
            let (handler, _clock, _rx) = create_handler();

            let response = handler.handle(IpcRequest::Status).await;

            assert_eq!(response.status, "success");
            let data = response.data.unwrap();
            assert_eq!(data.timers.len(), 3);
            assert!(data.timers.iter().all(|t| t.state == TimerPhase::Idle));
        }

        #[tokio::test]
        async fn test_handle_start() {
            let (handler, _clock, _rx) = create_handler();

            let response = handler.handle(start(TimerKind::EyeRest, Some(5_000))).await;

            assert_eq!(response.status, "success");
            assert_eq!(response.message, "Started eyeRest");
            let data = response.data.unwrap();
            let eye_rest = data.timer(TimerKind::EyeRest).unwrap();
            assert_eq!(eye_rest.state, TimerPhase::Running);
            assert_eq!(eye_rest.remaining, Some(5_000));
        }

        #[tokio::test]
        async fn test_handle_start_missing_length() {
            let (handler, _clock, _rx) = create_handler();

            let response = handler.handle(start(TimerKind::Break, None)).await;

            assert!(response.is_error());
            assert!(response.message.contains("no length"));
        }

        #[tokio::test]
        async fn test_handle_pause_and_resume() {
            let (handler, clock, _rx) = create_handler();

            handler.handle(start(TimerKind::Break, Some(3_000))).await;
            clock.set(1_000);

            let response = handler
                .handle(IpcRequest::Pause(PauseParams {
                    timer_type: TimerKind::Break,
                }))
                .await;
            assert_eq!(response.message, "Paused break");
            let data = response.data.unwrap();
            assert_eq!(data.timer(TimerKind::Break).unwrap().state, TimerPhase::Paused);
            assert_eq!(data.timer(TimerKind::Break).unwrap().remaining, Some(2_000));

            clock.set(2_000);
            let response = handler.handle(start(TimerKind::Break, None)).await;
            let data = response.data.unwrap();
            assert_eq!(data.timer(TimerKind::Break).unwrap().state, TimerPhase::Running);
            assert_eq!(data.timer(TimerKind::Break).unwrap().remaining, Some(2_000));
        }

        #[tokio::test]
        async fn test_handle_pause_not_started() {
            let (handler, _clock, _rx) = create_handler();

            let response = handler
                .handle(IpcRequest::Pause(PauseParams {
                    timer_type: TimerKind::StandUp,
                }))
                .await;

            assert!(response.is_error());
            assert!(response.message.contains("not been started"));
        }

        #[tokio::test]
        async fn test_handle_reset_many() {
            let (handler, _clock, _rx) = create_handler();

            for kind in TimerKind::ALL {
                handler.handle(start(kind, Some(60_000))).await;
            }

            let response = handler
                .handle(IpcRequest::Reset(ResetParams {
                    timer_type: vec![TimerKind::StandUp, TimerKind::Break].into(),
                }))
                .await;

            assert_eq!(response.message, "Reset standUp, break");
            let data = response.data.unwrap();
            assert_eq!(data.timer(TimerKind::EyeRest).unwrap().state, TimerPhase::Running);
            assert_eq!(data.timer(TimerKind::StandUp).unwrap().state, TimerPhase::Idle);
            assert_eq!(data.timer(TimerKind::StandUp).unwrap().timer_length, None);
            assert_eq!(data.timer(TimerKind::Break).unwrap().state, TimerPhase::Idle);
        }

        #[tokio::test]
        async fn test_handle_reset_empty_selection() {
            let (handler, _clock, _rx) = create_handler();
            handler.handle(start(TimerKind::EyeRest, Some(60_000))).await;

            let response = handler
                .handle(IpcRequest::Reset(ResetParams {
                    timer_type: TimerSelection::Many(Vec::new()),
                }))
                .await;

            assert!(response.is_error());
            assert!(response.message.contains("at least one timer"));

            let status = handler.handle(IpcRequest::Status).await.data.unwrap();
            assert_eq!(status.timer(TimerKind::EyeRest).unwrap().state, TimerPhase::Running);
        }
    }

    // ------------------------------------------------------------------------
    // Serve Tests
    // ------------------------------------------------------------------------

    mod serve_tests {
        use super::*;

        #[tokio::test]
        async fn test_serve_round_trip() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let (handler, _clock, _rx) = create_handler();

            let client_path = socket_path.clone();
            let client = tokio::spawn(async move {
                let stream = send_raw(
                    &client_path,
                    r#"{"action":"start","data":{"timerType":"standUp","timerLength":1000}}"#,
                )
                .await;
                let mut lines = BufReader::new(stream).lines();
                let line = lines.next_line().await.unwrap().unwrap();
                serde_json::from_str::<IpcResponse>(&line).unwrap()
            });

            let stream = server.accept().await.unwrap();
            handler.serve(stream).await.unwrap();

            let response = client.await.unwrap();
            assert_eq!(response.status, "success");
            assert_eq!(response.message, "Started standUp");
        }

        #[tokio::test]
        async fn test_serve_reports_bad_request() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let (handler, _clock, _rx) = create_handler();

            let client_path = socket_path.clone();
            let client = tokio::spawn(async move {
                let stream = send_raw(
                    &client_path,
                    r#"{"action":"start","data":{"timerType":"lunch"}}"#,
                )
                .await;
                let mut lines = BufReader::new(stream).lines();
                let line = lines.next_line().await.unwrap().unwrap();
                serde_json::from_str::<IpcResponse>(&line).unwrap()
            });

            let stream = server.accept().await.unwrap();
            assert!(handler.serve(stream).await.is_err());

            let response = client.await.unwrap();
            assert!(response.is_error());
            assert!(response.message.starts_with("Invalid request"));
        }

        #[tokio::test]
        async fn test_watch_streams_notifications() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let (handler, _clock, _rx) = create_handler();
            let publisher = handler.notifications.clone();

            let client_path = socket_path.clone();
            let client = tokio::spawn(async move {
                let stream = send_raw(&client_path, r#"{"action":"watch"}"#).await;
                let mut lines = BufReader::new(stream).lines();
                let ack: IpcResponse =
                    serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
                let tick: Notification =
                    serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
                let complete: Notification =
                    serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
                (ack, tick, complete)
            });

            let stream = server.accept().await.unwrap();
            let serving = tokio::spawn(async move { handler.serve(stream).await });

            // Wait for the subscription before publishing
            while publisher.receiver_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            publisher
                .send(Notification::Tick {
                    timer_type: TimerKind::EyeRest,
                    remaining: 1_000,
                })
                .unwrap();
            publisher
                .send(Notification::Complete {
                    timer_type: TimerKind::EyeRest,
                    time: CompletedAt::Epoch(42),
                })
                .unwrap();

            let (ack, tick, complete) = client.await.unwrap();
            assert_eq!(ack.status, "success");
            assert_eq!(
                tick,
                Notification::Tick {
                    timer_type: TimerKind::EyeRest,
                    remaining: 1_000
                }
            );
            assert_eq!(
                complete,
                Notification::Complete {
                    timer_type: TimerKind::EyeRest,
                    time: CompletedAt::Epoch(42)
                }
            );

            drop(publisher);
            serving.abort();
        }

        #[tokio::test]
        async fn test_watch_ends_when_client_disconnects() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let (handler, _clock, _rx) = create_handler();
            let publisher = handler.notifications.clone();

            let client_path = socket_path.clone();
            let client = tokio::spawn(async move {
                let stream = send_raw(&client_path, r#"{"action":"watch"}"#).await;
                let mut lines = BufReader::new(stream).lines();
                let ack: IpcResponse =
                    serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
                assert_eq!(ack.message, "Watching timers");
                // Dropping the reader closes the connection
            });

            let stream = server.accept().await.unwrap();
            let serving = tokio::spawn(async move { handler.serve(stream).await });
            client.await.unwrap();

            // No notifications are published, so only the hang-up can end serve
            let result = timeout(Duration::from_secs(5), serving)
                .await
                .expect("serve should return after the watcher hangs up");
            assert!(result.unwrap().is_ok());
            assert_eq!(publisher.receiver_count(), 0);
        }

        #[tokio::test]
        async fn test_ipc_error_display() {
            assert_eq!(IpcError::Timeout.to_string(), "Operation timed out");
            assert!(IpcError::RequestTooLarge.to_string().contains("4096"));
            assert_eq!(
                IpcError::ReadError("boom".to_string()).to_string(),
                "Failed to read request: boom"
            );
        }
    }
}
