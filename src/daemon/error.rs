//! Timer command error types.

use thiserror::Error;

use crate::types::TimerKind;

/// Errors returned when a command cannot be applied to a timer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Pause was requested for a timer that is not counting down.
    #[error("timer '{0}' has not been started")]
    NotStarted(TimerKind),

    /// Start was requested without a length and the timer has none.
    #[error("timer '{0}' has no length; pass one with start")]
    MissingLength(TimerKind),

    /// Zero-length countdowns are rejected.
    #[error("timer '{0}' length must be greater than zero")]
    InvalidLength(TimerKind),
}
