//! Time sources and completion timestamp formatting.
//!
//! Timer bookkeeping works in epoch milliseconds read through [`Clock`],
//! so the countdown logic can be driven by a [`ManualClock`] in tests.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::types::CompletedAt;

/// Default pattern for [`CompletionStamp::Local`].
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Clock
// ============================================================================

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Moves the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// CompletionStamp
// ============================================================================

/// How the `time` field of a completion notification is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompletionStamp {
    /// Raw epoch milliseconds
    #[default]
    Epoch,
    /// Local-timezone string using a strftime pattern
    Local { format: String },
}

impl CompletionStamp {
    /// Local-time stamp with the default pattern.
    pub fn local() -> Self {
        CompletionStamp::Local {
            format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Renders the completion instant.
    ///
    /// Falls back to the raw epoch value if the instant is out of range or
    /// the pattern cannot be rendered.
    pub fn stamp(&self, epoch_ms: i64) -> CompletedAt {
        match self {
            CompletionStamp::Epoch => CompletedAt::Epoch(epoch_ms),
            CompletionStamp::Local { format } => match format_local(epoch_ms, format) {
                Some(formatted) => CompletedAt::Formatted(formatted),
                None => {
                    tracing::warn!(epoch_ms, format = %format, "could not format completion time");
                    CompletedAt::Epoch(epoch_ms)
                }
            },
        }
    }

    /// Checks that the pattern is a valid strftime pattern.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            CompletionStamp::Epoch => Ok(()),
            CompletionStamp::Local { format } => {
                if format.trim().is_empty() {
                    return Err("time format must not be empty".to_string());
                }
                if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                    return Err(format!("invalid time format '{}'", format));
                }
                Ok(())
            }
        }
    }
}

fn format_local(epoch_ms: i64, format: &str) -> Option<String> {
    let local = DateTime::from_timestamp_millis(epoch_ms)?.with_timezone(&Local);
    let mut out = String::new();
    write!(out, "{}", local.format(format)).ok()?;
    Some(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod clock_tests {
        use super::*;

        #[test]
        fn test_manual_clock_set_and_advance() {
            let clock = ManualClock::new(1_000);
            assert_eq!(clock.now_ms(), 1_000);

            clock.advance(500);
            assert_eq!(clock.now_ms(), 1_500);

            clock.set(42);
            assert_eq!(clock.now_ms(), 42);
        }

        #[test]
        fn test_system_clock_is_after_2020() {
            assert!(SystemClock.now_ms() > 1_577_836_800_000);
        }
    }

    mod stamp_tests {
        use super::*;

        #[test]
        fn test_epoch_stamp() {
            let stamp = CompletionStamp::Epoch;
            assert_eq!(stamp.stamp(1_234), CompletedAt::Epoch(1_234));
        }

        #[test]
        fn test_local_stamp_uses_pattern() {
            let stamp = CompletionStamp::Local {
                format: "%Y".to_string(),
            };
            // Mid-2023 is 2023 in every timezone
            let at = 1_688_169_600_000;
            assert_eq!(stamp.stamp(at), CompletedAt::Formatted("2023".to_string()));
        }

        #[test]
        fn test_default_local_pattern_shape() {
            match CompletionStamp::local().stamp(1_688_169_600_000) {
                CompletedAt::Formatted(s) => assert_eq!(s.len(), "2023-07-01 00:00:00".len()),
                other => panic!("Expected formatted stamp, got {:?}", other),
            }
        }

        #[test]
        fn test_invalid_pattern_falls_back_to_epoch() {
            let stamp = CompletionStamp::Local {
                format: "%!".to_string(),
            };
            assert_eq!(stamp.stamp(5), CompletedAt::Epoch(5));
        }

        #[test]
        fn test_validate() {
            assert!(CompletionStamp::Epoch.validate().is_ok());
            assert!(CompletionStamp::local().validate().is_ok());
            assert!(CompletionStamp::Local {
                format: "  ".to_string()
            }
            .validate()
            .is_err());
            assert!(CompletionStamp::Local {
                format: "%!".to_string()
            }
            .validate()
            .is_err());
        }
    }
}
