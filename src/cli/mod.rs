//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Custodian using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Custodian - consent lifecycle and reversible anonymization
#[derive(Parser, Debug)]
#[command(name = "custodian")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "custodian.toml", env = "CUSTODIAN_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CUSTODIAN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Anonymize data whose legal reasons have expired
    Sweep(commands::sweep::SweepArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show store contents or the status of one record
    Status(commands::status::StatusArgs),

    /// Remove duplicate legal reasons and related objects
    Prune(commands::prune::PruneArgs),
}
