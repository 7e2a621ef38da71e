//! Timer registry: per-timer countdown state and elapsed-time bookkeeping.
//!
//! Each timer is a small state machine:
//! `Idle → Running → (Paused ⇄ Running) → Idle (length kept) → Running`.
//! All timestamps are epoch milliseconds supplied by the caller.

use std::collections::BTreeMap;

use crate::types::{Notification, TimerKind, TimerPhase, TimerSnapshot};

use super::clock::CompletionStamp;
use super::error::TimerError;

// ============================================================================
// TimerState
// ============================================================================

/// State of a single countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not counting down. A completed timer keeps its length.
    Idle { length_ms: Option<u64> },
    /// Counting down.
    Running {
        length_ms: u64,
        started_at: i64,
        paused_total_ms: u64,
    },
    /// Paused mid-countdown.
    Paused {
        length_ms: u64,
        started_at: i64,
        paused_at: i64,
        paused_total_ms: u64,
    },
}

impl Default for TimerState {
    fn default() -> Self {
        TimerState::Idle { length_ms: None }
    }
}

/// What a start command did to a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Began a countdown with no prior history
    Fresh,
    /// Continued from a pause
    Resumed,
    /// Already running; only the length changed
    LengthUpdated,
}

/// What a pause command did to a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Paused,
    AlreadyPaused,
}

impl TimerState {
    /// Returns the configured length, if any.
    pub fn length_ms(&self) -> Option<u64> {
        match *self {
            TimerState::Idle { length_ms } => length_ms,
            TimerState::Running { length_ms, .. } | TimerState::Paused { length_ms, .. } => {
                Some(length_ms)
            }
        }
    }

    /// Returns true if the timer is counting down.
    pub fn is_active(&self) -> bool {
        matches!(self, TimerState::Running { .. })
    }

    /// Returns the coarse phase for reporting.
    pub fn phase(&self) -> TimerPhase {
        match self {
            TimerState::Idle { .. } => TimerPhase::Idle,
            TimerState::Running { .. } => TimerPhase::Running,
            TimerState::Paused { .. } => TimerPhase::Paused,
        }
    }

    /// Remaining milliseconds at `now`, clamped to `[0, length]`.
    ///
    /// A paused timer reports the remaining time at the moment it was paused.
    pub fn remaining_ms(&self, now: i64) -> Option<u64> {
        match *self {
            TimerState::Idle { .. } => None,
            TimerState::Running {
                length_ms,
                started_at,
                paused_total_ms,
            } => Some(remaining(length_ms, started_at, paused_total_ms, now)),
            TimerState::Paused {
                length_ms,
                started_at,
                paused_at,
                paused_total_ms,
            } => Some(remaining(length_ms, started_at, paused_total_ms, paused_at)),
        }
    }

    /// Starts, resumes, or re-lengthens the countdown.
    pub fn start(&mut self, length_ms: u64, now: i64) -> StartOutcome {
        match *self {
            TimerState::Idle { .. } => {
                *self = TimerState::Running {
                    length_ms,
                    started_at: now,
                    paused_total_ms: 0,
                };
                StartOutcome::Fresh
            }
            TimerState::Paused {
                started_at,
                paused_at,
                paused_total_ms,
                ..
            } => {
                let paused_for = u64::try_from(now.saturating_sub(paused_at)).unwrap_or(0);
                *self = TimerState::Running {
                    length_ms,
                    started_at,
                    paused_total_ms: paused_total_ms.saturating_add(paused_for),
                };
                StartOutcome::Resumed
            }
            TimerState::Running {
                started_at,
                paused_total_ms,
                ..
            } => {
                *self = TimerState::Running {
                    length_ms,
                    started_at,
                    paused_total_ms,
                };
                StartOutcome::LengthUpdated
            }
        }
    }

    /// Pauses a running countdown. Returns `None` if the timer is idle.
    pub fn pause(&mut self, now: i64) -> Option<PauseOutcome> {
        match *self {
            TimerState::Idle { .. } => None,
            TimerState::Paused { .. } => Some(PauseOutcome::AlreadyPaused),
            TimerState::Running {
                length_ms,
                started_at,
                paused_total_ms,
            } => {
                *self = TimerState::Paused {
                    length_ms,
                    started_at,
                    paused_at: now,
                    paused_total_ms,
                };
                Some(PauseOutcome::Paused)
            }
        }
    }

    /// Clears the timer completely.
    pub fn reset(&mut self) {
        *self = TimerState::default();
    }

    /// Ends the countdown but keeps its length for the next start.
    fn complete(&mut self) {
        *self = TimerState::Idle {
            length_ms: self.length_ms(),
        };
    }
}

fn remaining(length_ms: u64, started_at: i64, paused_total_ms: u64, now: i64) -> u64 {
    let paused = i64::try_from(paused_total_ms).unwrap_or(i64::MAX);
    let elapsed = now.saturating_sub(started_at).saturating_sub(paused);
    let length = i64::try_from(length_ms).unwrap_or(i64::MAX);
    // clamp also covers a clock that stepped backwards
    let left = length.saturating_sub(elapsed).clamp(0, length);
    u64::try_from(left).unwrap_or(0)
}

// ============================================================================
// TimerRegistry
// ============================================================================

/// The fixed set of wellness timers.
#[derive(Debug, Clone)]
pub struct TimerRegistry {
    timers: BTreeMap<TimerKind, TimerState>,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    /// Creates a registry with every timer idle.
    pub fn new() -> Self {
        Self {
            timers: TimerKind::ALL
                .iter()
                .map(|kind| (*kind, TimerState::default()))
                .collect(),
        }
    }

    /// Returns the state of a timer.
    pub fn state(&self, kind: TimerKind) -> TimerState {
        self.timers.get(&kind).copied().unwrap_or_default()
    }

    fn state_mut(&mut self, kind: TimerKind) -> &mut TimerState {
        self.timers.entry(kind).or_default()
    }

    /// Applies a start command.
    ///
    /// Without an explicit length the timer's retained length is reused.
    pub fn start(
        &mut self,
        kind: TimerKind,
        length_ms: Option<u64>,
        now: i64,
    ) -> Result<StartOutcome, TimerError> {
        let state = self.state_mut(kind);
        let length_ms = length_ms
            .or_else(|| state.length_ms())
            .ok_or(TimerError::MissingLength(kind))?;
        if length_ms == 0 {
            return Err(TimerError::InvalidLength(kind));
        }
        Ok(state.start(length_ms, now))
    }

    /// Applies a pause command.
    pub fn pause(&mut self, kind: TimerKind, now: i64) -> Result<PauseOutcome, TimerError> {
        self.state_mut(kind)
            .pause(now)
            .ok_or(TimerError::NotStarted(kind))
    }

    /// Returns each named timer to the empty state.
    pub fn reset(&mut self, kinds: &[TimerKind]) {
        for kind in kinds {
            self.state_mut(*kind).reset();
        }
    }

    /// Returns true if any timer is counting down.
    pub fn has_active(&self) -> bool {
        self.timers.values().any(TimerState::is_active)
    }

    /// Recomputes every active timer.
    ///
    /// Emits a tick for each active timer and, for timers that reached zero,
    /// a completion followed by deactivation.
    pub fn check(&mut self, now: i64, stamp: &CompletionStamp) -> Vec<Notification> {
        let mut notifications = Vec::new();

        for (kind, state) in self.timers.iter_mut() {
            if !state.is_active() {
                continue;
            }
            let Some(remaining) = state.remaining_ms(now) else {
                continue;
            };

            tracing::debug!(timer = %kind, remaining, "checked timer");
            notifications.push(Notification::Tick {
                timer_type: *kind,
                remaining,
            });

            if remaining == 0 {
                tracing::info!(timer = %kind, "timer completed");
                notifications.push(Notification::Complete {
                    timer_type: *kind,
                    time: stamp.stamp(now),
                });
                state.complete();
            }
        }

        notifications
    }

    /// Returns a snapshot of every timer at `now`.
    pub fn snapshot(&self, now: i64) -> Vec<TimerSnapshot> {
        self.timers
            .iter()
            .map(|(kind, state)| TimerSnapshot {
                timer_type: *kind,
                state: state.phase(),
                timer_length: state.length_ms(),
                remaining: state.remaining_ms(now),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
