//! Batch processing engine.
//!
//! Each batch walks a fixed state machine: RECEIVED, CLASSIFIED against the
//! current resource snapshot, PREDICTED by the performance model, then
//! DISPATCHED under the selected strategy, ending COMPLETED or FAILED.
//! Completion feeds the predictor's training signal and, when ground truth
//! is present, the registry's per-skill counters. Failure and cancellation
//! discard partial results; counters only ever see whole batches.

pub mod benchmark;
pub mod strategy;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::seq::index::sample as sample_indices;
use serde::{Deserialize, Serialize};

use crate::config::{AnalyzerConfig, ResourceConstraints};
use crate::conflict::score_spans;
use crate::detector::{self, Detection};
use crate::error::{CgError, Result};
use crate::monitor::{ConstraintLevel, ResourceMonitor, ResourceSnapshot, classify};
use crate::predict::{PerformancePredictor, StrategyRecommendation, TrainingSample, WorkloadProfile};
use crate::skill::{SkillMatches, SkillRegistry, SkillSet, Span};

pub use benchmark::{BenchmarkEntry, BenchmarkReport};
pub use strategy::Strategy;

/// One item of a detection batch, optionally labeled for feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub text: String,
    /// Ground-truth spans. When present, the item's outcome is merged into
    /// per-skill performance counters on completion.
    pub expected: Option<Vec<Span>>,
}

impl BatchItem {
    pub fn unlabeled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expected: None,
        }
    }
}

/// A batch submitted for processing.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    /// Bypass the predictor and force a strategy.
    pub strategy: Option<Strategy>,
}

/// Lifecycle of one batch through the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Received,
    Classified,
    Predicted,
    Dispatched,
    Completed,
    Failed,
}

/// Detections for one processed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    /// Index of the item in the submitted batch.
    pub index: usize,
    /// Deduplicated union of all skill detections.
    pub detections: Vec<Detection>,
}

/// Result of one completed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub state: BatchState,
    pub strategy: Strategy,
    pub level: ConstraintLevel,
    pub recommendation: StrategyRecommendation,
    pub items_total: usize,
    /// Items actually scanned; less than the total under sampling.
    pub items_processed: usize,
    pub results: Vec<ItemResult>,
    pub total_detections: usize,
    /// Statistical estimate over the full batch when sampling was used.
    /// Lossy by design: an extrapolation, not a count.
    pub estimated_total_detections: Option<usize>,
    pub duration: Duration,
}

/// Cooperative cancellation flag shared with a dispatching batch.
///
/// Cancelling stops new item dispatch immediately; in-flight items finish
/// but the whole batch is abandoned and nothing reaches the counters.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct ProcessedItem {
    index: usize,
    matches: Vec<SkillMatches>,
}

/// The control loop: classify, predict, dispatch, record.
pub struct StrategySelector {
    registry: Arc<SkillRegistry>,
    monitor: Arc<ResourceMonitor>,
    predictor: Arc<PerformancePredictor>,
    constraints: RwLock<ResourceConstraints>,
    analyzer: AnalyzerConfig,
}

impl StrategySelector {
    #[must_use]
    pub fn new(
        registry: Arc<SkillRegistry>,
        monitor: Arc<ResourceMonitor>,
        predictor: Arc<PerformancePredictor>,
        constraints: ResourceConstraints,
        analyzer: AnalyzerConfig,
    ) -> Self {
        Self {
            registry,
            monitor,
            predictor,
            constraints: RwLock::new(constraints),
            analyzer,
        }
    }

    /// Current constraint ceilings.
    #[must_use]
    pub fn constraints(&self) -> ResourceConstraints {
        *self.constraints.read()
    }

    /// Replace the ceilings at runtime. Takes effect for the next batch.
    pub fn update_constraints(&self, constraints: ResourceConstraints) -> Result<()> {
        constraints.validate()?;
        tracing::info!(?constraints, "updated resource constraints");
        *self.constraints.write() = constraints;
        Ok(())
    }

    /// Latest snapshot and its classification, sampling once if the
    /// monitor has no history yet.
    #[must_use]
    pub fn resource_state(&self) -> (Option<ResourceSnapshot>, ConstraintLevel) {
        if self.monitor.current().is_none() {
            self.monitor.sample_once();
        }
        let constraints = self.constraints();
        let snapshot = self.monitor.current();
        let level = snapshot
            .as_ref()
            .map_or(ConstraintLevel::None, |s| classify(s, &constraints));
        (snapshot, level)
    }

    /// Process one batch synchronously. Blocks until completion,
    /// cancellation, or failure.
    pub fn process(&self, request: &BatchRequest, cancel: &CancelToken) -> Result<BatchOutcome> {
        match self.run_batch(request, cancel) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // FAILED is terminal for this batch only; the selector
                // keeps accepting new ones
                tracing::warn!(error = %err, state = ?BatchState::Failed, "batch failed, partial results discarded");
                Err(err)
            }
        }
    }

    fn run_batch(&self, request: &BatchRequest, cancel: &CancelToken) -> Result<BatchOutcome> {
        let constraints = self.constraints();
        tracing::debug!(items = request.items.len(), state = ?BatchState::Received, "batch received");
        if request.items.len() > constraints.max_batch_size {
            return Err(CgError::StrategyExecutionFailed(format!(
                "batch of {} items exceeds max_batch_size {}",
                request.items.len(),
                constraints.max_batch_size
            )));
        }

        let (snapshot, level) = self.resource_state();
        let snapshot = snapshot.unwrap_or_else(|| ResourceSnapshot {
            cpu_percent: 0.0,
            memory_percent: 0.0,
            available_memory_mb: 0.0,
            active_workers: 0,
            timestamp: chrono::Utc::now(),
            stale: true,
        });
        tracing::debug!(%level, state = ?BatchState::Classified, "batch classified");

        let skills = self.registry.snapshot_active();
        let set = SkillSet::prepare(&skills, &self.analyzer)?;
        let profile = WorkloadProfile {
            items: request.items.len(),
            skills: set.len(),
        };
        let recommendation = self.predictor.predict(profile, &snapshot, &constraints);
        let strategy = request.strategy.unwrap_or(recommendation.strategy);
        tracing::debug!(
            %strategy,
            confidence = recommendation.confidence,
            heuristic = recommendation.heuristic,
            state = ?BatchState::Predicted,
            "strategy selected"
        );

        let started = Instant::now();
        tracing::debug!(state = ?BatchState::Dispatched, "batch dispatched");
        let processed = self.dispatch(strategy, level, &request.items, &set, &constraints, cancel)?;
        let duration = started.elapsed();

        if cancel.is_cancelled() {
            return Err(CgError::Cancelled);
        }

        let outcome = self.complete(
            request,
            strategy,
            level,
            recommendation,
            processed,
            duration,
            &snapshot,
            set.len(),
        );
        tracing::info!(
            %strategy,
            items = outcome.items_processed,
            detections = outcome.total_detections,
            duration_ms = duration.as_millis() as u64,
            state = ?BatchState::Completed,
            "batch completed"
        );
        Ok(outcome)
    }

    fn dispatch(
        &self,
        strategy: Strategy,
        level: ConstraintLevel,
        items: &[BatchItem],
        set: &SkillSet,
        constraints: &ResourceConstraints,
        cancel: &CancelToken,
    ) -> Result<Vec<ProcessedItem>> {
        match strategy {
            Strategy::Sequential => Ok(self.run_sequential(items, set, cancel)),
            Strategy::BatchOptimized => Ok(self.run_batched(items, set, cancel)),
            Strategy::ParallelLimited => self.run_parallel(items, set, constraints, cancel),
            Strategy::SkillPriority => Ok(self.run_skill_priority(items, set, cancel)),
            Strategy::AdaptiveSampling => Ok(self.run_sampled(items, set, level, cancel)),
        }
    }

    fn run_sequential(
        &self,
        items: &[BatchItem],
        set: &SkillSet,
        cancel: &CancelToken,
    ) -> Vec<ProcessedItem> {
        let _worker = self.monitor.worker_gauge().enter();
        let mut processed = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            processed.push(ProcessedItem {
                index,
                matches: set.run_text(&item.text),
            });
        }
        processed
    }

    /// Chunked sequential processing; amortizes per-chunk bookkeeping and
    /// gives cancellation a coarser but cheaper check.
    fn run_batched(
        &self,
        items: &[BatchItem],
        set: &SkillSet,
        cancel: &CancelToken,
    ) -> Vec<ProcessedItem> {
        const CHUNK: usize = 32;
        let _worker = self.monitor.worker_gauge().enter();
        let mut processed = Vec::with_capacity(items.len());
        for (chunk_index, chunk) in items.chunks(CHUNK).enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let base = chunk_index * CHUNK;
            for (offset, item) in chunk.iter().enumerate() {
                processed.push(ProcessedItem {
                    index: base + offset,
                    matches: set.run_text(&item.text),
                });
            }
        }
        processed
    }

    fn run_parallel(
        &self,
        items: &[BatchItem],
        set: &SkillSet,
        constraints: &ResourceConstraints,
        cancel: &CancelToken,
    ) -> Result<Vec<ProcessedItem>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(constraints.max_concurrent_tasks)
            .build()
            .map_err(|err| CgError::StrategyExecutionFailed(err.to_string()))?;

        let gauge = self.monitor.worker_gauge();
        let mut processed: Vec<ProcessedItem> = pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let _worker = gauge.enter();
                    Some(ProcessedItem {
                        index,
                        matches: set.run_text(&item.text),
                    })
                })
                .collect()
        });
        processed.sort_by_key(|p| p.index);
        Ok(processed)
    }

    /// All items, but skills run best-F1 first so the strongest detectors
    /// see every item even if operators cancel partway.
    fn run_skill_priority(
        &self,
        items: &[BatchItem],
        set: &SkillSet,
        cancel: &CancelToken,
    ) -> Vec<ProcessedItem> {
        let order = self.priority_order(set);
        let _worker = self.monitor.worker_gauge().enter();
        let mut processed = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            processed.push(ProcessedItem {
                index,
                matches: set.run_text_with(&item.text, &order),
            });
        }
        processed
    }

    fn run_sampled(
        &self,
        items: &[BatchItem],
        set: &SkillSet,
        level: ConstraintLevel,
        cancel: &CancelToken,
    ) -> Vec<ProcessedItem> {
        if items.is_empty() {
            return vec![];
        }
        let ratio = Strategy::sampling_ratio(level);
        let count = ((items.len() as f64 * ratio).ceil() as usize).clamp(1, items.len());
        let mut rng = rand::rng();
        let mut chosen: Vec<usize> = sample_indices(&mut rng, items.len(), count).into_vec();
        chosen.sort_unstable();

        let _worker = self.monitor.worker_gauge().enter();
        let mut processed = Vec::with_capacity(count);
        for index in chosen {
            if cancel.is_cancelled() {
                break;
            }
            processed.push(ProcessedItem {
                index,
                matches: set.run_text(&items[index].text),
            });
        }
        processed
    }

    /// Dispatch-order indices sorted by descending F1, unscored skills
    /// last, ties broken by name.
    fn priority_order(&self, set: &SkillSet) -> Vec<usize> {
        let names = set.names();
        let mut order: Vec<usize> = (0..names.len()).collect();
        order.sort_by(|&a, &b| {
            let fa = self.registry.get(&names[a]).and_then(|e| e.record.f1());
            let fb = self.registry.get(&names[b]).and_then(|e| e.record.f1());
            fb.partial_cmp(&fa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| names[a].cmp(&names[b]))
        });
        order
    }

    #[allow(clippy::too_many_arguments)]
    fn complete(
        &self,
        request: &BatchRequest,
        strategy: Strategy,
        level: ConstraintLevel,
        recommendation: StrategyRecommendation,
        processed: Vec<ProcessedItem>,
        duration: Duration,
        snapshot: &ResourceSnapshot,
        skills: usize,
    ) -> BatchOutcome {
        let items_total = request.items.len();
        let items_processed = processed.len();
        let sampled = strategy == Strategy::AdaptiveSampling && items_processed < items_total;

        // Ground-truth feedback: aggregate per skill across the whole
        // batch, then apply each skill's counts in one atomic update
        let mut per_skill: std::collections::HashMap<String, (u64, u64, u64)> =
            std::collections::HashMap::new();
        for item in &processed {
            let Some(expected) = &request.items[item.index].expected else {
                continue;
            };
            for matches in &item.matches {
                let spans: Vec<Span> = matches
                    .detections
                    .iter()
                    .map(|d| Span::new(d.start, d.end))
                    .collect();
                let (tp, fp, fn_) = score_spans(&spans, expected);
                let entry = per_skill.entry(matches.skill.clone()).or_default();
                entry.0 += tp;
                entry.1 += fp;
                entry.2 += fn_;
            }
        }
        for (name, (tp, fp, fn_)) in per_skill {
            if let Err(err) = self.registry.record_outcome(&name, tp, fp, fn_) {
                tracing::warn!(skill = %name, error = %err, "dropping feedback for missing skill");
            }
        }

        self.predictor.record(TrainingSample {
            strategy,
            profile: WorkloadProfile {
                items: items_processed,
                skills,
            },
            cpu_percent: snapshot.cpu_percent,
            duration,
        });

        let results: Vec<ItemResult> = processed
            .into_iter()
            .map(|item| ItemResult {
                index: item.index,
                detections: detector::dedup_spans(
                    item.matches.into_iter().flat_map(|m| m.detections).collect(),
                ),
            })
            .collect();
        let total_detections: usize = results.iter().map(|r| r.detections.len()).sum();
        let estimated_total_detections = sampled.then(|| {
            (total_detections as f64 / items_processed.max(1) as f64 * items_total as f64).round()
                as usize
        });

        BatchOutcome {
            state: BatchState::Completed,
            strategy,
            level,
            recommendation,
            items_total,
            items_processed,
            results,
            total_detections,
            estimated_total_detections,
            duration,
        }
    }
}
