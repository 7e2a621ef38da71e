//! Timer engine for the wellness timers.
//!
//! This module provides:
//! - Command handling (start / pause / reset) on top of [`TimerRegistry`]
//! - The periodic check that emits tick and complete notifications
//! - A scheduler that only ticks while at least one timer is running

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::types::{Notification, TimerKind, TimerSnapshot};

use super::clock::{Clock, CompletionStamp, SystemClock};
use super::error::TimerError;
use super::registry::{PauseOutcome, StartOutcome, TimerRegistry};

/// Default interval between checks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// TimerEngine
// ============================================================================

/// Owns the timer registry and publishes notifications.
pub struct TimerEngine {
    /// Per-timer state
    registry: TimerRegistry,
    /// Time source
    clock: Arc<dyn Clock>,
    /// Completion timestamp policy
    stamp: CompletionStamp,
    /// Notification sender channel
    event_tx: mpsc::UnboundedSender<Notification>,
    /// Wakes the scheduler when a timer becomes active
    wake: Arc<Notify>,
    /// Whether the scheduler is currently ticking
    ticking: bool,
}

impl TimerEngine {
    /// Creates an engine reading the system clock.
    pub fn new(stamp: CompletionStamp, event_tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self::with_clock(Arc::new(SystemClock), stamp, event_tx)
    }

    /// Creates an engine with a custom time source.
    pub fn with_clock(
        clock: Arc<dyn Clock>,
        stamp: CompletionStamp,
        event_tx: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        Self {
            registry: TimerRegistry::new(),
            clock,
            stamp,
            event_tx,
            wake: Arc::new(Notify::new()),
            ticking: false,
        }
    }

    /// Starts or resumes a timer.
    ///
    /// Without a length the timer's retained length is reused.
    ///
    /// # Errors
    ///
    /// Returns an error if no length is known or the length is zero.
    pub fn start(&mut self, kind: TimerKind, length_ms: Option<u64>) -> Result<(), TimerError> {
        let now = self.clock.now_ms();
        match self.registry.start(kind, length_ms, now)? {
            StartOutcome::Fresh => tracing::info!(timer = %kind, ?length_ms, "timer started"),
            StartOutcome::Resumed => tracing::info!(timer = %kind, "timer resumed"),
            StartOutcome::LengthUpdated => tracing::info!(timer = %kind, ?length_ms, "timer length updated"),
        }
        self.ensure_ticking();
        Ok(())
    }

    /// Pauses a running timer. Pausing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer has not been started.
    pub fn pause(&mut self, kind: TimerKind) -> Result<(), TimerError> {
        let now = self.clock.now_ms();
        match self.registry.pause(kind, now)? {
            PauseOutcome::Paused => tracing::info!(timer = %kind, "timer paused"),
            PauseOutcome::AlreadyPaused => tracing::debug!(timer = %kind, "timer already paused"),
        }
        Ok(())
    }

    /// Resets the named timers to the empty state.
    pub fn reset(&mut self, kinds: &[TimerKind]) {
        tracing::info!(timers = ?kinds, "resetting timers");
        self.registry.reset(kinds);
    }

    /// Runs one periodic check and publishes the resulting notifications.
    ///
    /// Returns true if any timer is still counting down afterwards.
    pub fn check(&mut self) -> bool {
        let now = self.clock.now_ms();
        for notification in self.registry.check(now, &self.stamp) {
            if self.event_tx.send(notification).is_err() {
                tracing::warn!("notification receiver dropped");
            }
        }
        self.registry.has_active()
    }

    /// Returns a snapshot of every timer.
    pub fn snapshot(&self) -> Vec<TimerSnapshot> {
        self.registry.snapshot(self.clock.now_ms())
    }

    /// Returns the timer registry.
    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    /// Returns true while the scheduler is ticking.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    fn ensure_ticking(&mut self) {
        if !self.ticking && self.registry.has_active() {
            tracing::debug!("waking scheduler");
            self.ticking = true;
            self.wake.notify_one();
        }
    }

    /// Runs the scheduler loop.
    ///
    /// Sleeps until a timer is started, then checks every `period` until no
    /// timer is running. This method never returns; spawn it as a task.
    pub async fn run(engine: Arc<Mutex<TimerEngine>>, period: Duration) {
        let wake = engine.lock().await.wake.clone();

        loop {
            wake.notified().await;
            tracing::debug!(?period, "scheduler ticking");

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let mut engine = engine.lock().await;
                if !engine.check() {
                    engine.ticking = false;
                    break;
                }
            }

            tracing::debug!("scheduler idle");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
