//! Comparative strategy benchmarking.
//!
//! Runs the same workload once under every strategy and reports the
//! timings side by side. Used for tuning the heuristic fallback table; the
//! runs also feed the predictor's training history like any other batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{BatchItem, BatchRequest, CancelToken, Strategy, StrategySelector};
use crate::error::Result;

/// Timing of one strategy over the benchmark workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    pub strategy: Strategy,
    pub duration: Duration,
    pub items_processed: usize,
    pub total_detections: usize,
    /// Present for sampling strategies, where the count is extrapolated.
    pub estimated_total_detections: Option<usize>,
}

/// All strategies over one workload, fastest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub items: usize,
    pub entries: Vec<BenchmarkEntry>,
}

impl BenchmarkReport {
    #[must_use]
    pub fn fastest(&self) -> Option<&BenchmarkEntry> {
        self.entries.first()
    }
}

/// Run `items` once under every strategy.
///
/// Strategies run one after another so they never contend with each other
/// for the worker pool; each run still goes through the full batch state
/// machine and records training signal.
pub fn run(selector: &StrategySelector, items: Vec<BatchItem>) -> Result<BenchmarkReport> {
    let total = items.len();
    let mut entries = Vec::with_capacity(Strategy::ALL.len());
    for strategy in Strategy::ALL {
        let request = BatchRequest {
            items: items.clone(),
            strategy: Some(strategy),
        };
        let outcome = selector.process(&request, &CancelToken::new())?;
        tracing::info!(
            %strategy,
            duration_ms = outcome.duration.as_millis() as u64,
            "benchmark run finished"
        );
        entries.push(BenchmarkEntry {
            strategy,
            duration: outcome.duration,
            items_processed: outcome.items_processed,
            total_detections: outcome.total_detections,
            estimated_total_detections: outcome.estimated_total_detections,
        });
    }
    entries.sort_by_key(|e| e.duration);
    Ok(BenchmarkReport {
        items: total,
        entries,
    })
}
