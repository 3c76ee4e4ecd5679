//! Command-line interface for feedbox.
//!
//! This module provides the CLI structure for the `feedbox` binary. Command
//! handlers live in the binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DeleteCommand, FlushCommand, ListCommand, PendingCommand, StatusCommand,
    SubmitCommand, WatchCommand,
};

/// feedbox - Collect feedback, even when the network is gone
///
/// Submissions made while offline are kept in a local queue and sent to the
/// remote store once connectivity returns.
#[derive(Debug, Parser)]
#[command(name = "feedbox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Treat the network as unreachable (queue instead of sending)
    #[arg(long, global = true)]
    pub offline: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit feedback
    Submit(SubmitCommand),

    /// List feedback, pending entries first
    List(ListCommand),

    /// Delete feedback by id
    Delete(DeleteCommand),

    /// Send queued feedback to the remote store
    Flush(FlushCommand),

    /// Show feedback waiting in the local queue
    Pending(PendingCommand),

    /// Watch connectivity and flush the queue whenever the network returns
    Watch(WatchCommand),

    /// Show connectivity and queue status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            offline: false,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "feedbox");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        use crate::logging::Verbosity;

        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from([
            "feedbox",
            "submit",
            "--name",
            "Ada",
            "--email",
            "ada@example.com",
            "--message",
            "Loved the talk",
        ])
        .unwrap();
        match cli.command {
            Command::Submit(cmd) => {
                assert_eq!(cmd.name, "Ada");
                assert!(!cmd.json);
            }
            other => panic!("expected submit, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_submit_requires_fields() {
        assert!(Cli::try_parse_from(["feedbox", "submit", "--name", "Ada"]).is_err());
    }

    #[test]
    fn test_parse_list_with_search() {
        let cli = Cli::try_parse_from(["feedbox", "list", "--search", "talk", "--json"]).unwrap();
        match cli.command {
            Command::List(cmd) => {
                assert_eq!(cmd.search.as_deref(), Some("talk"));
                assert!(cmd.json);
                assert!(cmd.limit.is_none());
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete() {
        let cli = Cli::try_parse_from(["feedbox", "delete", "srv-1"]).unwrap();
        assert!(matches!(cli.command, Command::Delete(DeleteCommand { ref id }) if id == "srv-1"));
    }

    #[test]
    fn test_parse_global_offline_after_subcommand() {
        let cli = Cli::try_parse_from(["feedbox", "flush", "--offline"]).unwrap();
        assert!(cli.offline);
        assert!(matches!(cli.command, Command::Flush(_)));
    }

    #[test]
    fn test_parse_watch_interval() {
        let cli = Cli::try_parse_from(["feedbox", "watch", "--interval", "500"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Watch(WatchCommand { interval: Some(500) })
        ));
    }

    #[test]
    fn test_parse_watch_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["feedbox", "watch", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["feedbox", "watch", "-i", "1"]).is_ok());
    }

    #[test]
    fn test_parse_config_subcommands() {
        let cli = Cli::try_parse_from(["feedbox", "config", "path"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));

        let cli = Cli::try_parse_from(["feedbox", "config", "show", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { json: true })
        ));
    }

    #[test]
    fn test_parse_with_config_and_verbosity() {
        let cli = Cli::try_parse_from(["feedbox", "-vv", "--config", "/tmp/f.toml", "pending"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
        assert!(matches!(cli.command, Command::Pending(_)));
    }
}
