//! Display utilities for the restwell CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - Error messages
//! - Timer status
//! - Streamed notifications

use crate::types::{IpcResponse, Notification, TimerPhase, TimerSnapshot};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the result of a start, pause or reset command.
    pub fn show_command_success(response: &IpcResponse) {
        println!("* {}", response.message);
    }

    /// Shows every timer.
    pub fn show_status(response: &IpcResponse) {
        println!("Timers");
        println!("─────────────────────────────");

        match &response.data {
            Some(data) if !data.timers.is_empty() => {
                for timer in &data.timers {
                    println!("{}", Self::format_snapshot(timer));
                }
            }
            _ => println!("No timer information available"),
        }
    }

    /// Shows one streamed notification.
    pub fn show_notification(notification: &Notification) {
        println!("{}", Self::format_notification(notification));
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Formats one status line.
    pub fn format_snapshot(timer: &TimerSnapshot) -> String {
        let name = timer.timer_type.as_str();
        match (timer.state, timer.remaining) {
            (TimerPhase::Idle, _) => match timer.timer_length {
                Some(length) => format!("{:<8} idle (last length {})", name, Self::format_ms(length)),
                None => format!("{:<8} idle", name),
            },
            (state, Some(remaining)) => {
                format!("{:<8} {:<8} {} left", name, state.as_str(), Self::format_ms(remaining))
            }
            (state, None) => format!("{:<8} {}", name, state.as_str()),
        }
    }

    /// Formats one notification line.
    pub fn format_notification(notification: &Notification) -> String {
        match notification {
            Notification::Tick {
                timer_type,
                remaining,
            } => format!("{:<8} {}", timer_type.as_str(), Self::format_ms(*remaining)),
            Notification::Complete { timer_type, time } => {
                format!("{:<8} complete at {}", timer_type.as_str(), time)
            }
        }
    }

    /// Formats milliseconds as `m:ss`, rounding partial seconds up.
    pub fn format_ms(ms: u64) -> String {
        let total_seconds = ms.div_ceil(1_000);
        format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletedAt, TimerKind};

    #[test]
    fn test_format_ms() {
        assert_eq!(Display::format_ms(0), "0:00");
        assert_eq!(Display::format_ms(999), "0:01");
        assert_eq!(Display::format_ms(5_000), "0:05");
        assert_eq!(Display::format_ms(20 * 60_000), "20:00");
        assert_eq!(Display::format_ms(61_500), "1:02");
    }

    #[test]
    fn test_format_running_snapshot() {
        let line = Display::format_snapshot(&TimerSnapshot {
            timer_type: TimerKind::EyeRest,
            state: TimerPhase::Running,
            timer_length: Some(20 * 60_000),
            remaining: Some(90_000),
        });
        assert!(line.starts_with("eyeRest"));
        assert!(line.contains("running"));
        assert!(line.ends_with("1:30 left"));
    }

    #[test]
    fn test_format_idle_snapshot() {
        let empty = Display::format_snapshot(&TimerSnapshot {
            timer_type: TimerKind::Break,
            state: TimerPhase::Idle,
            timer_length: None,
            remaining: None,
        });
        assert_eq!(empty.trim_end(), "break    idle");

        let completed = Display::format_snapshot(&TimerSnapshot {
            timer_type: TimerKind::Break,
            state: TimerPhase::Idle,
            timer_length: Some(300_000),
            remaining: None,
        });
        assert!(completed.contains("last length 5:00"));
    }

    #[test]
    fn test_format_notifications() {
        let tick = Display::format_notification(&Notification::Tick {
            timer_type: TimerKind::StandUp,
            remaining: 4_000,
        });
        assert_eq!(tick, "standUp  0:04");

        let complete = Display::format_notification(&Notification::Complete {
            timer_type: TimerKind::StandUp,
            time: CompletedAt::Formatted("10:00".to_string()),
        });
        assert_eq!(complete, "standUp  complete at 10:00");
    }
}
