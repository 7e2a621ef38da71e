//! Core data types shared by the daemon and the CLI.
//!
//! This module defines:
//! - Timer identifiers and selections of identifiers
//! - Notifications pushed to clients (`tick` / `complete`)
//! - IPC request/response serialization

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// TimerKind
// ============================================================================

/// Identifier of one of the fixed wellness countdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerKind {
    /// Look away from the screen
    EyeRest,
    /// Get up from the desk
    StandUp,
    /// Longer break away from work
    Break,
}

impl TimerKind {
    /// Every timer, in check order.
    pub const ALL: [TimerKind; 3] = [TimerKind::EyeRest, TimerKind::StandUp, TimerKind::Break];

    /// Returns the wire name of the timer.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::EyeRest => "eyeRest",
            TimerKind::StandUp => "standUp",
            TimerKind::Break => "break",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known timer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timer '{0}' (expected eyeRest, standUp or break)")]
pub struct ParseTimerKindError(pub String);

impl FromStr for TimerKind {
    type Err = ParseTimerKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eyeRest" | "eye-rest" => Ok(TimerKind::EyeRest),
            "standUp" | "stand-up" => Ok(TimerKind::StandUp),
            "break" => Ok(TimerKind::Break),
            other => Err(ParseTimerKindError(other.to_string())),
        }
    }
}

// ============================================================================
// TimerSelection
// ============================================================================

/// One timer or a list of timers, as accepted by `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimerSelection {
    One(TimerKind),
    Many(Vec<TimerKind>),
}

impl TimerSelection {
    /// Returns the selected timers.
    pub fn kinds(&self) -> Vec<TimerKind> {
        match self {
            TimerSelection::One(kind) => vec![*kind],
            TimerSelection::Many(kinds) => kinds.clone(),
        }
    }
}

impl From<TimerKind> for TimerSelection {
    fn from(kind: TimerKind) -> Self {
        TimerSelection::One(kind)
    }
}

impl From<Vec<TimerKind>> for TimerSelection {
    fn from(kinds: Vec<TimerKind>) -> Self {
        if kinds.len() == 1 {
            TimerSelection::One(kinds[0])
        } else {
            TimerSelection::Many(kinds)
        }
    }
}

// ============================================================================
// TimerPhase / TimerSnapshot
// ============================================================================

/// Coarse phase of a timer, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Never started, reset, or completed
    #[default]
    Idle,
    /// Counting down
    Running,
    /// Paused mid-countdown
    Paused,
}

impl TimerPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
        }
    }
}

/// Read-only view of one timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    #[serde(rename = "timerType")]
    pub timer_type: TimerKind,
    pub state: TimerPhase,
    /// Configured length in milliseconds
    #[serde(rename = "timerLength", skip_serializing_if = "Option::is_none")]
    pub timer_length: Option<u64>,
    /// Remaining milliseconds (absent while idle)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
}

// ============================================================================
// Notification
// ============================================================================

/// Completion instant, either raw epoch milliseconds or a formatted string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletedAt {
    Epoch(i64),
    Formatted(String),
}

impl fmt::Display for CompletedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletedAt::Epoch(ms) => write!(f, "{}", ms),
            CompletedAt::Formatted(s) => f.write_str(s),
        }
    }
}

/// Message pushed from the daemon to watching clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
    /// Periodic remaining-time report
    Tick {
        #[serde(rename = "timerType")]
        timer_type: TimerKind,
        /// Remaining milliseconds
        remaining: u64,
    },
    /// Countdown reached zero
    Complete {
        #[serde(rename = "timerType")]
        timer_type: TimerKind,
        time: CompletedAt,
    },
}

impl Notification {
    /// Returns the timer this notification is about.
    pub fn timer_type(&self) -> TimerKind {
        match self {
            Notification::Tick { timer_type, .. } | Notification::Complete { timer_type, .. } => {
                *timer_type
            }
        }
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// Parameters for the start command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartParams {
    #[serde(rename = "timerType")]
    pub timer_type: TimerKind,
    /// Countdown length in milliseconds
    #[serde(rename = "timerLength", default, skip_serializing_if = "Option::is_none")]
    pub timer_length: Option<u64>,
}

/// Parameters for the pause command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseParams {
    #[serde(rename = "timerType")]
    pub timer_type: TimerKind,
}

/// Parameters for the reset command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetParams {
    #[serde(rename = "timerType")]
    pub timer_type: TimerSelection,
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Start or resume a timer
    Start(StartParams),
    /// Pause a running timer
    Pause(PauseParams),
    /// Reset one or more timers
    Reset(ResetParams),
    /// Query every timer
    Status,
    /// Subscribe to notifications
    Watch,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    pub timers: Vec<TimerSnapshot>,
}

impl ResponseData {
    /// Returns the snapshot of the given timer, if present.
    pub fn timer(&self, kind: TimerKind) -> Option<&TimerSnapshot> {
        self.timers.iter().find(|t| t.timer_type == kind)
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true if this is an error response.
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

// ============================================================================
// Tests
// ============================================================================
