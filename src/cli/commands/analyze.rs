//! cardguard analyze - Gap analysis and skill generation over a corpus.
//!
//! The corpus file is JSON Lines: one object per line with `text` and
//! `expected` span fields.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_json, heading, kv};
use crate::error::{CgError, Result};
use crate::gaps::LabeledExample;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Labeled corpus (JSON Lines of {"text", "expected": [{"start","end"}]})
    #[arg(long, short = 'c')]
    pub corpus: PathBuf,
}

pub fn run(ctx: &AppContext, args: &AnalyzeArgs) -> Result<()> {
    let corpus = load_corpus(&args.corpus)?;
    let outcome = ctx.run_gap_analysis(&corpus)?;

    if ctx.robot_mode {
        return emit_json(&outcome);
    }

    heading("Gap analysis");
    kv("examples", corpus.len());
    kv("labeled spans", outcome.report.total_expected);
    kv("missed spans", outcome.report.total_missed);
    if let Some(coverage) = outcome.report.coverage() {
        kv("coverage", format!("{:.1}%", coverage * 100.0));
    }

    for gap in &outcome.report.gaps {
        println!(
            "  gap {} [{:?} sev {:.2}] shape `{}` ({} examples)",
            gap.signature,
            gap.kind,
            gap.severity,
            gap.shape,
            gap.examples.len()
        );
    }

    if !outcome.registered.is_empty() {
        heading("Registered");
        for name in &outcome.registered {
            println!("  {}", name.green());
        }
    }
    if !outcome.rejected.is_empty() {
        heading("Rejected");
        for candidate in &outcome.rejected {
            println!("  {} {}", candidate.gap, candidate.reason.red());
        }
    }
    if !outcome.blocked.is_empty() {
        heading("Blocked (manual resolution required)");
        for candidate in &outcome.blocked {
            for conflict in &candidate.conflicts {
                println!(
                    "  {} {:?} with `{}`: {}",
                    candidate.gap,
                    conflict.kind,
                    conflict.with,
                    conflict.detail.yellow()
                );
            }
        }
    }
    if !outcome.unresolved.is_empty() {
        heading("Unresolved (manual review)");
        for signature in &outcome.unresolved {
            println!("  {signature}");
        }
    }
    Ok(())
}

fn load_corpus(path: &std::path::Path) -> Result<Vec<LabeledExample>> {
    let raw = std::fs::read_to_string(path)?;
    let mut corpus = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let example: LabeledExample = serde_json::from_str(line).map_err(|err| {
            CgError::Config(format!(
                "corpus {} line {}: {err}",
                path.display(),
                number + 1
            ))
        })?;
        corpus.push(example);
    }
    if corpus.is_empty() {
        return Err(CgError::Config(format!(
            "corpus {} holds no examples",
            path.display()
        )));
    }
    Ok(corpus)
}
