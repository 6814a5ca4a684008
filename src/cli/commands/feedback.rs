//! cardguard feedback - Submit labeled outcome counts for a skill.

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::emit_json;
use crate::error::{CgError, Result};

#[derive(Args, Debug)]
pub struct FeedbackArgs {
    /// Skill name
    pub skill: String,

    /// Confirmed true positives
    #[arg(long, default_value = "0")]
    pub tp: u64,

    /// Confirmed false positives
    #[arg(long, default_value = "0")]
    pub fp: u64,

    /// Confirmed false negatives (missed detections)
    #[arg(long = "fn", default_value = "0")]
    pub fn_: u64,
}

pub fn run(ctx: &AppContext, args: &FeedbackArgs) -> Result<()> {
    ctx.submit_feedback(&args.skill, args.tp, args.fp, args.fn_)?;
    let entry = ctx
        .registry()
        .get(&args.skill)
        .ok_or_else(|| CgError::SkillNotFound(args.skill.clone()))?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "skill": args.skill,
            "record": entry.record,
        }));
    }

    println!(
        "{}: tp={} fp={} fn={} f1={}",
        args.skill,
        entry.record.true_positives,
        entry.record.false_positives,
        entry.record.false_negatives,
        entry
            .record
            .f1()
            .map_or_else(|| "-".to_string(), |f1| format!("{f1:.3}")),
    );
    Ok(())
}
