//! cardguard benchmark - Time a workload under every strategy.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::emit_json;
use crate::engine::{BatchItem, benchmark};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct BenchmarkArgs {
    /// Workload file, one item per line (synthetic workload when omitted)
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Synthetic workload size when no file is given
    #[arg(long, default_value = "100")]
    pub items: usize,
}

pub fn run(ctx: &AppContext, args: &BenchmarkArgs) -> Result<()> {
    let items = workload(args)?;
    let report = benchmark::run(ctx.selector(), items)?;

    if ctx.robot_mode {
        return emit_json(&report);
    }

    println!(
        "{}",
        format!(
            "{:<18} {:>10} {:>8} {:>10}",
            "STRATEGY", "DURATION", "ITEMS", "DETECTIONS"
        )
        .bold()
    );
    for entry in &report.entries {
        let detections = match entry.estimated_total_detections {
            Some(estimate) => format!("~{estimate}"),
            None => entry.total_detections.to_string(),
        };
        println!(
            "{:<18} {:>8.1}ms {:>8} {:>10}",
            entry.strategy.to_string(),
            entry.duration.as_secs_f64() * 1000.0,
            entry.items_processed,
            detections,
        );
    }
    if let Some(fastest) = report.fastest() {
        println!("{}", format!("fastest: {}", fastest.strategy).green());
    }
    Ok(())
}

fn workload(args: &BenchmarkArgs) -> Result<Vec<BatchItem>> {
    if let Some(path) = &args.file {
        let raw = std::fs::read_to_string(path)?;
        return Ok(raw
            .lines()
            .filter(|line| !line.is_empty())
            .map(BatchItem::unlabeled)
            .collect());
    }
    // Alternate clean text and known-good test numbers
    Ok((0..args.items)
        .map(|i| {
            if i % 2 == 0 {
                BatchItem::unlabeled(format!("invoice {i} paid by card 4111 1111 1111 1111"))
            } else {
                BatchItem::unlabeled(format!("invoice {i} settled by bank transfer"))
            }
        })
        .collect())
}
