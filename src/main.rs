//! restwell CLI
//!
//! Runs the timer daemon and talks to it:
//! - `restwell daemon` keeps the eye-rest, stand-up and break countdowns
//! - `restwell start|pause|reset|status` drive them
//! - `restwell watch` prints ticks and completions

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tokio::time::Duration;

use restwell::cli::{Cli, Commands, DaemonArgs, Display, IpcClient};
use restwell::daemon::{self, config::default_socket_path, DaemonConfig};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli);

    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins; otherwise the daemon logs at info and clients at warn.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Some(Commands::Daemon(_)), false) => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(false).init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let socket = cli.socket.clone();

    match cli.command {
        Some(Commands::Daemon(args)) => {
            daemon::run(daemon_config(socket, &args)?).await?;
        }
        Some(Commands::Start(args)) => {
            let response = client(socket)?.start(args.timer, args.length_ms()).await?;
            Display::show_command_success(&response);
        }
        Some(Commands::Pause { timer }) => {
            let response = client(socket)?.pause(timer).await?;
            Display::show_command_success(&response);
        }
        Some(Commands::Reset { timers }) => {
            let response = client(socket)?.reset(timers).await?;
            Display::show_command_success(&response);
        }
        Some(Commands::Status) => {
            let response = client(socket)?.status().await?;
            Display::show_status(&response);
        }
        Some(Commands::Watch { json }) => {
            client(socket)?
                .watch(|notification| {
                    if json {
                        match serde_json::to_string(&notification) {
                            Ok(line) => println!("{}", line),
                            Err(e) => tracing::warn!("could not encode notification: {}", e),
                        }
                    } else {
                        Display::show_notification(&notification);
                    }
                })
                .await?;
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Builds an IPC client for the given or default socket.
fn client(socket: Option<PathBuf>) -> Result<IpcClient> {
    match socket {
        Some(path) => Ok(IpcClient::with_socket_path(path)),
        None => IpcClient::new(),
    }
}

/// Builds the daemon configuration from command-line flags.
fn daemon_config(socket: Option<PathBuf>, args: &DaemonArgs) -> Result<DaemonConfig> {
    let socket_path = match socket {
        Some(path) => path,
        None => default_socket_path()?,
    };
    Ok(DaemonConfig::new(socket_path)
        .with_tick_interval(Duration::from_millis(args.tick_ms))
        .with_stamp(args.completion_stamp()))
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_config_from_args() {
        let cli = Cli::parse_from([
            "restwell",
            "--socket",
            "/tmp/restwell-main.sock",
            "daemon",
            "--tick-ms",
            "500",
            "--stamp",
            "local",
        ]);
        let Some(Commands::Daemon(args)) = &cli.command else {
            panic!("Expected Daemon command");
        };

        let config = daemon_config(cli.socket.clone(), args).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/restwell-main.sock"));
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_uses_socket_override() {
        let client = client(Some(PathBuf::from("/tmp/x.sock"))).unwrap();
        assert_eq!(client.socket_path(), &PathBuf::from("/tmp/x.sock"));
    }
}
