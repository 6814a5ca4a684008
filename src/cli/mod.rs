//! Command-line interface definitions and handlers.
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// cardguard - adaptive payment-card detection and redaction engine
#[derive(Parser, Debug)]
#[command(name = "cardguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable JSON output for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/cardguard/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan text for payment-card numbers
    Scan(commands::scan::ScanArgs),

    /// Show current resource state and constraint level
    Status(commands::status::StatusArgs),

    /// List registered skills with performance metadata
    Skills(commands::skills::SkillsArgs),

    /// Submit labeled feedback for a named skill
    Feedback(commands::feedback::FeedbackArgs),

    /// Run gap analysis and skill generation over a labeled corpus
    Analyze(commands::analyze::AnalyzeArgs),

    /// Time a workload under every strategy
    Benchmark(commands::benchmark::BenchmarkArgs),

    /// Show or update resource constraints
    Constraints(commands::constraints::ConstraintsArgs),
}
