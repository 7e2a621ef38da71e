//! Command definitions for the restwell CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::daemon::clock::{CompletionStamp, DEFAULT_TIME_FORMAT};
use crate::types::TimerKind;

// ============================================================================
// CLI Structure
// ============================================================================

/// restwell - eye-rest, stand-up and break reminder timers
#[derive(Parser, Debug)]
#[command(
    name = "restwell",
    version,
    about = "Background countdown timers for eye-rest, stand-up and break reminders",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon socket path (defaults to ~/.restwell/restwell.sock)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the timer daemon
    Daemon(DaemonArgs),

    /// Start or resume a timer
    Start(StartArgs),

    /// Pause a running timer
    Pause {
        /// Timer to pause (eyeRest, standUp, break)
        timer: TimerKind,
    },

    /// Reset one or more timers
    Reset {
        /// Timers to reset (eyeRest, standUp, break)
        #[arg(required = true, num_args = 1..)]
        timers: Vec<TimerKind>,
    },

    /// Show every timer
    Status,

    /// Print tick and complete notifications as they happen
    Watch {
        /// Print raw JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Start Command Arguments
// ============================================================================

/// Arguments for the start command
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Timer to start (eyeRest, standUp, break)
    pub timer: TimerKind,

    /// Countdown length in minutes (1-240)
    #[arg(
        short,
        long,
        conflicts_with = "seconds",
        value_parser = clap::value_parser!(u64).range(1..=240)
    )]
    pub minutes: Option<u64>,

    /// Countdown length in seconds (1-14400)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u64).range(1..=14_400)
    )]
    pub seconds: Option<u64>,
}

impl StartArgs {
    /// Returns the requested length in milliseconds, if any.
    pub fn length_ms(&self) -> Option<u64> {
        self.minutes
            .map(|m| m * 60_000)
            .or_else(|| self.seconds.map(|s| s * 1_000))
    }
}

// ============================================================================
// Daemon Command Arguments
// ============================================================================

/// Completion timestamp style
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StampStyle {
    /// Epoch milliseconds
    #[default]
    Epoch,
    /// Local-time string
    Local,
}

/// Arguments for the daemon command
#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// Interval between timer checks in milliseconds (100-60000)
    #[arg(
        long,
        default_value = "1000",
        value_parser = clap::value_parser!(u64).range(100..=60_000)
    )]
    pub tick_ms: u64,

    /// Completion timestamp style
    #[arg(long, value_enum, default_value_t = StampStyle::Epoch)]
    pub stamp: StampStyle,

    /// strftime pattern for local timestamps
    #[arg(long, default_value = DEFAULT_TIME_FORMAT)]
    pub time_format: String,
}

impl DaemonArgs {
    /// Returns the completion timestamp policy.
    pub fn completion_stamp(&self) -> CompletionStamp {
        match self.stamp {
            StampStyle::Epoch => CompletionStamp::Epoch,
            StampStyle::Local => CompletionStamp::Local {
                format: self.time_format.clone(),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
