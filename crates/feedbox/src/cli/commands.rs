//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::feedback::FeedbackValues;

/// Submit command arguments.
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Your name (at least 2 characters)
    #[arg(short, long)]
    pub name: String,

    /// Your email address
    #[arg(short, long)]
    pub email: String,

    /// The feedback message (at least 10 characters)
    #[arg(short, long)]
    pub message: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SubmitCommand {
    /// The form values carried by this command.
    #[must_use]
    pub fn values(&self) -> FeedbackValues {
        FeedbackValues::new(&self.name, &self.email, &self.message)
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show feedback whose name, email or message contains this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Id of the feedback to delete (pending or remote)
    pub id: String,
}

/// Flush command arguments.
#[derive(Debug, Args)]
pub struct FlushCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Pending command arguments.
#[derive(Debug, Args)]
pub struct PendingCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Probe interval in milliseconds (overrides configuration)
    #[arg(short, long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
