//! The closed strategy set and the heuristic fallback table.

use serde::{Deserialize, Serialize};

use crate::monitor::ConstraintLevel;

/// How a batch is processed. The set is closed; the predictor, selector,
/// and benchmark all iterate [`Strategy::ALL`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One item at a time on one worker.
    Sequential,
    /// Fixed-size chunks processed back to back.
    BatchOptimized,
    /// Bounded worker pool.
    ParallelLimited,
    /// All items, but skills dispatched best-F1 first.
    SkillPriority,
    /// Scan a representative subset and extrapolate the counts. Lossy:
    /// reported totals are statistical estimates, not exact.
    AdaptiveSampling,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Sequential,
        Strategy::BatchOptimized,
        Strategy::ParallelLimited,
        Strategy::SkillPriority,
        Strategy::AdaptiveSampling,
    ];

    /// Fixed fallback mapping used when prediction history is too sparse.
    #[must_use]
    pub fn for_level(level: ConstraintLevel) -> Strategy {
        match level {
            ConstraintLevel::None => Strategy::ParallelLimited,
            ConstraintLevel::Low => Strategy::BatchOptimized,
            ConstraintLevel::Medium => Strategy::SkillPriority,
            ConstraintLevel::High => Strategy::AdaptiveSampling,
            ConstraintLevel::Critical => Strategy::Sequential,
        }
    }

    /// Sampling ratio for `adaptive_sampling` under a given level. More
    /// pressure, smaller sample.
    #[must_use]
    pub fn sampling_ratio(level: ConstraintLevel) -> f64 {
        match level {
            ConstraintLevel::Critical => 0.10,
            ConstraintLevel::High => 0.25,
            _ => 0.50,
        }
    }

    /// Whether this strategy may be recommended at a level. The pool-based
    /// strategy is off the table once the machine is at `Medium` or worse,
    /// however well its cost model fits; explicit caller overrides are not
    /// subject to this.
    #[must_use]
    pub fn permitted_at(self, level: ConstraintLevel) -> bool {
        match self {
            Strategy::ParallelLimited => level <= ConstraintLevel::Low,
            _ => true,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sequential => "sequential",
            Self::BatchOptimized => "batch_optimized",
            Self::ParallelLimited => "parallel_limited",
            Self::SkillPriority => "skill_priority",
            Self::AdaptiveSampling => "adaptive_sampling",
        };
        f.write_str(name)
    }
}
