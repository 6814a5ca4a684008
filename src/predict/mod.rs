//! Performance prediction.
//!
//! One least-squares line per strategy, fit over (effective workload,
//! observed duration) pairs with running sums: recording a sample and
//! evicting the oldest are both O(1), so training never blocks a predict
//! call. Below the configured sample floor the predictor falls back to the
//! fixed heuristic table with a low, explicit confidence.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::{PredictorConfig, ResourceConstraints};
use crate::engine::strategy::Strategy;
use crate::error::{CgError, Result};
use crate::monitor::{ConstraintLevel, ResourceSnapshot, classify};

/// Workload description handed to `predict`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkloadProfile {
    /// Items in the batch.
    pub items: usize,
    /// Active skills that will run per item.
    pub skills: usize,
}

impl WorkloadProfile {
    /// Effective workload: item-skill pairs scaled up by current CPU load,
    /// so the same batch predicts slower on a busy machine.
    #[must_use]
    fn effective(&self, cpu_percent: f64) -> f64 {
        let pairs = (self.items * self.skills.max(1)) as f64;
        pairs * (1.0 + cpu_percent.clamp(0.0, 100.0) / 100.0)
    }
}

/// One observed (workload, strategy, outcome) tuple.
#[derive(Debug, Clone, Copy)]
pub struct TrainingSample {
    pub strategy: Strategy,
    pub profile: WorkloadProfile,
    pub cpu_percent: f64,
    pub duration: Duration,
}

/// Output of one `predict` call. Produced per request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    pub strategy: Strategy,
    pub level: ConstraintLevel,
    /// Estimated wall time, absent when only the heuristic table spoke.
    pub predicted_duration: Option<Duration>,
    /// Estimated items per second.
    pub predicted_throughput: Option<f64>,
    /// In [0, 1]. Heuristic fallbacks report the configured low value.
    pub confidence: f64,
    /// Whether the heuristic table, not the model, chose the strategy.
    pub heuristic: bool,
    /// The snapshot the decision was based on.
    pub snapshot: ResourceSnapshot,
}

/// Running least-squares state for one strategy.
#[derive(Debug, Default)]
struct StrategyModel {
    samples: VecDeque<(f64, f64)>,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_xy: f64,
    sum_yy: f64,
}

impl StrategyModel {
    fn push(&mut self, x: f64, y: f64, capacity: usize) {
        if self.samples.len() == capacity {
            if let Some((ox, oy)) = self.samples.pop_front() {
                self.sum_x -= ox;
                self.sum_y -= oy;
                self.sum_xx -= ox * ox;
                self.sum_xy -= ox * oy;
                self.sum_yy -= oy * oy;
            }
        }
        self.samples.push_back((x, y));
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_xy += x * y;
        self.sum_yy += y * y;
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    /// Fitted (slope, intercept), or `None` for a degenerate x spread.
    fn line(&self) -> Option<(f64, f64)> {
        let n = self.len() as f64;
        let denom = n * self.sum_xx - self.sum_x * self.sum_x;
        if denom.abs() < f64::EPSILON {
            return None;
        }
        let slope = (n * self.sum_xy - self.sum_x * self.sum_y) / denom;
        let intercept = (self.sum_y - slope * self.sum_x) / n;
        Some((slope, intercept))
    }

    /// Coefficient of determination, clamped to [0, 1].
    fn r_squared(&self) -> f64 {
        let n = self.len() as f64;
        let Some((slope, _)) = self.line() else {
            return 0.0;
        };
        let ss_tot = self.sum_yy - self.sum_y * self.sum_y / n;
        if ss_tot.abs() < f64::EPSILON {
            // All observed durations equal: the fit is trivially exact
            return 1.0;
        }
        let ss_xy = self.sum_xy - self.sum_x * self.sum_y / n;
        (slope * ss_xy / ss_tot).clamp(0.0, 1.0)
    }

    fn predict(&self, x: f64) -> Option<f64> {
        let (slope, intercept) = self.line()?;
        Some((slope * x + intercept).max(0.0))
    }
}

/// Per-strategy regression models behind one lock.
pub struct PerformancePredictor {
    config: PredictorConfig,
    models: RwLock<HashMap<Strategy, StrategyModel>>,
}

impl PerformancePredictor {
    #[must_use]
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Record one completed batch as training signal. O(1).
    pub fn record(&self, sample: TrainingSample) {
        let x = sample.profile.effective(sample.cpu_percent);
        let y = sample.duration.as_secs_f64();
        let mut models = self.models.write();
        models
            .entry(sample.strategy)
            .or_default()
            .push(x, y, self.config.history_size);
    }

    /// Training samples held for one strategy.
    #[must_use]
    pub fn sample_count(&self, strategy: Strategy) -> usize {
        self.models
            .read()
            .get(&strategy)
            .map_or(0, StrategyModel::len)
    }

    /// Recommend a strategy for a workload under current conditions.
    ///
    /// With enough history the best-predicted trained strategy permitted at
    /// the current constraint level wins and the confidence is that model's
    /// fit quality. When no permitted model is trained this degrades to the
    /// heuristic table at the configured low confidence; it never dresses a
    /// guess up as a high-confidence prediction.
    #[must_use]
    pub fn predict(
        &self,
        profile: WorkloadProfile,
        snapshot: &ResourceSnapshot,
        constraints: &ResourceConstraints,
    ) -> StrategyRecommendation {
        let level = classify(snapshot, constraints);
        match self.model_recommendation(profile, snapshot, level) {
            Ok(recommendation) => recommendation,
            Err(err) => {
                tracing::debug!(%level, error = %err, "degrading to heuristic table");
                StrategyRecommendation {
                    strategy: Strategy::for_level(level),
                    level,
                    predicted_duration: None,
                    predicted_throughput: None,
                    confidence: self.config.fallback_confidence,
                    heuristic: true,
                    snapshot: snapshot.clone(),
                }
            }
        }
    }

    /// The trained path of `predict`. Strategies not permitted at the
    /// current level are never candidates, however well their models fit.
    fn model_recommendation(
        &self,
        profile: WorkloadProfile,
        snapshot: &ResourceSnapshot,
        level: ConstraintLevel,
    ) -> Result<StrategyRecommendation> {
        let x = profile.effective(snapshot.cpu_percent);
        let models = self.models.read();
        let (strategy, secs, confidence) = Strategy::ALL
            .iter()
            .filter(|strategy| strategy.permitted_at(level))
            .filter_map(|&strategy| {
                let model = models.get(&strategy)?;
                if model.len() < self.config.min_samples {
                    return None;
                }
                let duration = model.predict(x)?;
                Some((strategy, duration, model.r_squared()))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| {
                CgError::PredictionUnavailable(format!(
                    "no trained strategy permitted at level {level}"
                ))
            })?;

        let throughput = (secs > 0.0).then(|| profile.items as f64 / secs);
        Ok(StrategyRecommendation {
            strategy,
            level,
            predicted_duration: Some(Duration::from_secs_f64(secs)),
            predicted_throughput: throughput,
            confidence,
            heuristic: false,
            snapshot: snapshot.clone(),
        })
    }
}
