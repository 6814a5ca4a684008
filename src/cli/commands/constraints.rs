//! cardguard constraints - Show or update the resource ceilings.

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{emit_json, heading, kv};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ConstraintsArgs {
    /// New CPU ceiling (percent)
    #[arg(long)]
    pub max_cpu: Option<f64>,

    /// New memory ceiling (percent)
    #[arg(long)]
    pub max_memory: Option<f64>,

    /// New maximum batch size
    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// New worker pool ceiling
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

pub fn run(ctx: &AppContext, args: &ConstraintsArgs) -> Result<()> {
    let mut constraints = ctx.status().constraints;
    let updating = args.max_cpu.is_some()
        || args.max_memory.is_some()
        || args.max_batch_size.is_some()
        || args.max_concurrent.is_some();

    if updating {
        if let Some(cpu) = args.max_cpu {
            constraints.max_cpu_percent = cpu;
        }
        if let Some(memory) = args.max_memory {
            constraints.max_memory_percent = memory;
        }
        if let Some(batch) = args.max_batch_size {
            constraints.max_batch_size = batch;
        }
        if let Some(workers) = args.max_concurrent {
            constraints.max_concurrent_tasks = workers;
        }
        ctx.update_constraints(constraints)?;
    }

    if ctx.robot_mode {
        return emit_json(&constraints);
    }

    heading(if updating {
        "Updated constraints"
    } else {
        "Constraints"
    });
    kv("max cpu", format!("{:.0}%", constraints.max_cpu_percent));
    kv("max memory", format!("{:.0}%", constraints.max_memory_percent));
    kv("max batch size", constraints.max_batch_size);
    kv("max concurrent tasks", constraints.max_concurrent_tasks);
    Ok(())
}
