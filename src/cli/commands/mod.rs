//! CLI command implementations.
//!
//! Each subcommand has its own module with an Args struct and a `run()`
//! function.

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod analyze;
pub mod benchmark;
pub mod constraints;
pub mod feedback;
pub mod scan;
pub mod skills;
pub mod status;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Scan(args) => scan::run(ctx, args),
        Commands::Status(args) => status::run(ctx, args),
        Commands::Skills(args) => skills::run(ctx, args),
        Commands::Feedback(args) => feedback::run(ctx, args),
        Commands::Analyze(args) => analyze::run(ctx, args),
        Commands::Benchmark(args) => benchmark::run(ctx, args),
        Commands::Constraints(args) => constraints::run(ctx, args),
    }
}
