//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// Voice biometric login and registration in the terminal
#[derive(Parser)]
#[command(name = "voicegate")]
#[command(version)]
#[command(about = "Voice biometric login and registration in the terminal")]
#[command(long_about = "Voice biometric login and registration in the terminal.\n\nRecords a short voice sample, encodes it as Opus/WebM and sends it to a\nvoice verification service.\n\nDEFAULT COMMAND:\n    If no command is specified, 'login' is used by default.\n\nEXAMPLES:\n    # Log in with your voice\n    $ voicegate\n\n    # Enroll a new voice print for alice\n    $ voicegate register alice\n\n    # Point the client at another service\n    $ voicegate config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/voicegate/voicegate.toml\n    Logs:               ~/.local/state/voicegate/voicegate.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify your identity by voice (default)
    ///
    /// Press space to start and stop recording, Enter to authenticate,
    /// Tab to switch to registration, Escape to quit.
    #[command(visible_alias = "l")]
    Login,

    /// Enroll a voice print under a username
    ///
    /// Type a username, press Ctrl+R to record the prompt phrase, Enter to
    /// register. Recording stops on its own after the minimum duration.
    #[command(visible_alias = "r")]
    Register {
        /// Username to pre-fill
        #[arg(value_name = "USERNAME")]
        username: Option<String>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Edit the service URL, timeouts and audio settings.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in voicegate.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   voicegate completions bash > voicegate.bash
    ///   voicegate completions zsh > _voicegate
    ///   voicegate completions fish > voicegate.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that print to the terminal run without file logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "voicegate", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return exit_on_error(commands::handle_list_devices()),
        Some(Commands::Logs) => return exit_on_error(commands::handle_logs()),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Login) => commands::handle_login().await?,
        Some(Commands::Register { username }) => commands::handle_register(username).await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

fn exit_on_error(result: Result<(), anyhow::Error>) -> Result<(), anyhow::Error> {
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_login_is_the_default() {
        let cli = Cli::try_parse_from(["voicegate"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_register_accepts_username() {
        let cli = Cli::try_parse_from(["voicegate", "register", "alice"]).unwrap();
        match cli.command {
            Some(Commands::Register { username }) => assert_eq!(username.as_deref(), Some("alice")),
            _ => panic!("expected register"),
        }

        let cli = Cli::try_parse_from(["voicegate", "register"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Register { username: None })));
    }
}
