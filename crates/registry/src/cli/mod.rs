//! Command-line interface for the caregiver registry.
//!
//! This module provides the CLI structure for the `carereg` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CaregiverCommand, CaregiverFields, CaregiverFilterArgs, ChildCommand, ChildFilterArgs,
    ConfigCommand, EditCommand, ExportCommand, ExportFormatArg, ExportTablesArg, ImportCommand,
    MigrateCommand, NameFilterArgs, NamesCommand, OutputFormat, RowKindArg, SaveCommand,
};

use crate::logging::Verbosity;

/// carereg - Caregiver and children registry
///
/// Records caregivers and their children, imports and exports spreadsheets,
/// and tracks names awaiting verification.
#[derive(Debug, Parser)]
#[command(name = "carereg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add, edit, delete and list caregivers
    #[command(subcommand)]
    Caregiver(CaregiverCommand),

    /// List children
    #[command(subcommand)]
    Child(ChildCommand),

    /// Import caregiver or child rows from a file
    Import(ImportCommand),

    /// Export the registry to CSV, Excel or JSON
    Export(ExportCommand),

    /// Run a data migration
    #[command(subcommand)]
    Migrate(MigrateCommand),

    /// Back up the database now
    Backup,

    /// Show registry statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show database status
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Manage names awaiting verification
    #[command(subcommand)]
    Names(NamesCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
