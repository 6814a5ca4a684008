//! cardguard skills - List registered skills with performance metadata.

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_json, score};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct SkillsArgs {
    /// Only live skills at or above this F1, best first
    #[arg(long)]
    pub min_f1: Option<f64>,
}

pub fn run(ctx: &AppContext, args: &SkillsArgs) -> Result<()> {
    let rows = ctx.list_skills(args.min_f1);

    if ctx.robot_mode {
        return emit_json(&rows);
    }

    if rows.is_empty() {
        println!("no skills match");
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<24} {:>3} {:>6} {:>6} {:>6} {:>6} {:>6} {:>5} {}",
            "NAME", "VER", "TP", "FP", "FN", "PREC", "REC", "F1", "GRADE"
        )
        .bold()
    );
    for row in rows {
        let name = if row.active {
            row.name.normal()
        } else {
            format!("{} (retired)", row.name).dimmed()
        };
        println!(
            "{:<24} {:>3} {:>6} {:>6} {:>6} {:>6} {:>6} {:>5} {}",
            name,
            row.version,
            row.true_positives,
            row.false_positives,
            row.false_negatives,
            score(row.precision),
            score(row.recall),
            score(row.f1),
            row.grade.map_or_else(|| "-".to_string(), |g| g.to_string()),
        );
    }
    Ok(())
}
