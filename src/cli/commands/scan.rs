//! cardguard scan - Detect card numbers in text.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::emit_json;
use crate::detector::{self, RedactMode};
use crate::engine::{BatchItem, BatchRequest, CancelToken, Strategy};
use crate::error::{CgError, Result};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Text to scan (reads --file when omitted)
    pub text: Option<String>,

    /// File to scan, one batch item per line
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Force a strategy instead of asking the predictor
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Print each item with matches replaced by [REDACTED]
    #[arg(long, conflicts_with = "mask")]
    pub redact: bool,

    /// Print each item with matches masked down to the last four digits
    #[arg(long)]
    pub mask: bool,
}

pub fn run(ctx: &AppContext, args: &ScanArgs) -> Result<()> {
    let items = collect_items(args)?;
    if items.is_empty() {
        return Err(CgError::Config(
            "nothing to scan: pass TEXT or --file".to_string(),
        ));
    }

    let request = BatchRequest {
        items,
        strategy: args.strategy,
    };
    let outcome = ctx.process(&request, &CancelToken::new())?;

    let redact_mode = redact_mode(args);
    let redacted: Vec<Option<String>> = outcome
        .results
        .iter()
        .map(|r| {
            redact_mode.map(|mode| {
                detector::redact(&request.items[r.index].text, &r.detections, mode)
            })
        })
        .collect();

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "outcome": outcome,
            "redacted": redacted,
        }));
    }

    for (result, redacted) in outcome.results.iter().zip(&redacted) {
        for d in &result.detections {
            let validity = if d.valid {
                "valid".green()
            } else {
                "invalid".red()
            };
            println!(
                "item {} [{}..{}] {} {}",
                result.index, d.start, d.end, d.network, validity
            );
        }
        if let Some(text) = redacted {
            println!("item {}: {text}", result.index);
        }
    }

    let summary = format!(
        "{} detections in {}/{} items via {} ({:?})",
        outcome.total_detections,
        outcome.items_processed,
        outcome.items_total,
        outcome.strategy,
        outcome.level,
    );
    println!("{}", summary.bold());
    if let Some(estimate) = outcome.estimated_total_detections {
        println!(
            "{}",
            format!("sampled run: ~{estimate} detections estimated over the full batch").yellow()
        );
    }
    Ok(())
}

fn collect_items(args: &ScanArgs) -> Result<Vec<BatchItem>> {
    if let Some(text) = &args.text {
        return Ok(vec![BatchItem::unlabeled(text.clone())]);
    }
    let Some(path) = &args.file else {
        return Ok(vec![]);
    };
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter(|line| !line.is_empty())
        .map(BatchItem::unlabeled)
        .collect())
}

fn redact_mode(args: &ScanArgs) -> Option<RedactMode> {
    if args.redact {
        Some(RedactMode::Redact)
    } else if args.mask {
        Some(RedactMode::Mask)
    } else {
        None
    }
}
