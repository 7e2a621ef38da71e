//! restwell library
//!
//! Countdown timers for eye-rest, stand-up and break reminders, run by a
//! background daemon so timing never depends on the UI. It includes:
//! - Timer registry and engine with a self-stopping 1-second check
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities
//! - Type definitions for notifications and IPC messages

pub mod cli;
pub mod daemon;
pub mod types;

// Re-export commonly used types for convenience
pub use daemon::{CompletionStamp, DaemonConfig, TimerEngine, TimerError, TimerRegistry};
pub use types::{
    CompletedAt, IpcRequest, IpcResponse, Notification, ResponseData, TimerKind, TimerPhase,
    TimerSelection, TimerSnapshot,
};
