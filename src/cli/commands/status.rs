//! cardguard status - Current resource state and constraint level.

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{emit_json, heading, kv};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub fn run(ctx: &AppContext, _args: &StatusArgs) -> Result<()> {
    let status = ctx.status();

    if ctx.robot_mode {
        return emit_json(&status);
    }

    heading("Resource state");
    match &status.snapshot {
        Some(s) => {
            kv("cpu", format!("{:.1}%", s.cpu_percent));
            kv("memory", format!("{:.1}%", s.memory_percent));
            kv("available memory", format!("{:.0} MB", s.available_memory_mb));
            kv("active workers", s.active_workers);
            if s.stale {
                kv("stale", "yes (last OS probe failed)");
            }
        }
        None => kv("snapshot", "none yet"),
    }
    if let Some(window) = &status.window {
        kv(
            "60s average",
            format!(
                "cpu {:.1}% / mem {:.1}% over {} samples",
                window.cpu_percent, window.memory_percent, window.samples
            ),
        );
    }

    heading("Engine");
    kv("constraint level", status.level);
    kv("active skills", status.active_skills);
    kv(
        "ceilings",
        format!(
            "cpu {:.0}% / mem {:.0}% / batch {} / workers {}",
            status.constraints.max_cpu_percent,
            status.constraints.max_memory_percent,
            status.constraints.max_batch_size,
            status.constraints.max_concurrent_tasks,
        ),
    );
    Ok(())
}
