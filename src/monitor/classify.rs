//! Constraint classification.
//!
//! A pure function from one snapshot plus the configured ceilings to an
//! ordered severity level. The thresholds are fractions of the *configured*
//! ceilings, not of the machine's absolute capacity, so lowering a ceiling
//! at runtime immediately tightens classification.

use serde::{Deserialize, Serialize};

use super::ResourceSnapshot;
use crate::config::ResourceConstraints;

/// Severity of the current resource pressure, ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ConstraintLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

// Utilization fractions (relative to the configured ceiling) at which each
// level begins. A reading exactly on a boundary takes the higher level.
const LOW: f64 = 0.60;
const MEDIUM: f64 = 0.75;
const HIGH: f64 = 0.85;
const CRITICAL: f64 = 0.95;

/// Classify a snapshot against the configured ceilings.
///
/// The dominant dimension wins: the level is taken from the largest of the
/// cpu, memory, and worker utilization fractions. Deterministic for equal
/// inputs; monotonic in every dimension.
#[must_use]
pub fn classify(snapshot: &ResourceSnapshot, constraints: &ResourceConstraints) -> ConstraintLevel {
    let cpu = fraction(snapshot.cpu_percent, constraints.max_cpu_percent);
    let memory = fraction(snapshot.memory_percent, constraints.max_memory_percent);
    let workers = fraction(
        snapshot.active_workers as f64,
        constraints.max_concurrent_tasks as f64,
    );
    let dominant = cpu.max(memory).max(workers);

    if dominant >= CRITICAL {
        ConstraintLevel::Critical
    } else if dominant >= HIGH {
        ConstraintLevel::High
    } else if dominant >= MEDIUM {
        ConstraintLevel::Medium
    } else if dominant >= LOW {
        ConstraintLevel::Low
    } else {
        ConstraintLevel::None
    }
}

fn fraction(value: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 {
        // A zero ceiling means any load at all is over budget
        if value > 0.0 { f64::INFINITY } else { 0.0 }
    } else {
        value / ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(cpu: f64, memory: f64, workers: usize) -> ResourceSnapshot {
        ResourceSnapshot {
            cpu_percent: cpu,
            memory_percent: memory,
            available_memory_mb: 4096.0,
            active_workers: workers,
            timestamp: Utc::now(),
            stale: false,
        }
    }

    fn ceilings() -> ResourceConstraints {
        ResourceConstraints {
            max_cpu_percent: 80.0,
            max_memory_percent: 80.0,
            max_batch_size: 500,
            max_concurrent_tasks: 4,
        }
    }

    #[test]
    fn levels_follow_cpu_fraction() {
        let c = ceilings();
        // Fractions of the 80% ceiling: 40/80=0.5, 50/80=0.625, 62/80=0.775,
        // 70/80=0.875, 78/80=0.975
        assert_eq!(classify(&snapshot(40.0, 0.0, 0), &c), ConstraintLevel::None);
        assert_eq!(classify(&snapshot(50.0, 0.0, 0), &c), ConstraintLevel::Low);
        assert_eq!(
            classify(&snapshot(62.0, 0.0, 0), &c),
            ConstraintLevel::Medium
        );
        assert_eq!(classify(&snapshot(70.0, 0.0, 0), &c), ConstraintLevel::High);
        assert_eq!(
            classify(&snapshot(78.0, 0.0, 0), &c),
            ConstraintLevel::Critical
        );
    }

    #[test]
    fn over_ceiling_is_critical() {
        // cpu above its own ceiling must land at the top regardless of the
        // other dimensions
        assert_eq!(
            classify(&snapshot(85.0, 10.0, 0), &ceilings()),
            ConstraintLevel::Critical
        );
    }

    #[test]
    fn boundary_reading_takes_higher_level() {
        // 60/80 = exactly 0.75
        assert_eq!(
            classify(&snapshot(60.0, 0.0, 0), &ceilings()),
            ConstraintLevel::Medium
        );
    }

    #[test]
    fn dominant_dimension_wins() {
        let c = ceilings();
        assert_eq!(
            classify(&snapshot(10.0, 78.0, 0), &c),
            ConstraintLevel::Critical
        );
        // 3 of 4 workers = 0.75
        assert_eq!(
            classify(&snapshot(10.0, 10.0, 3), &c),
            ConstraintLevel::Medium
        );
    }

    #[test]
    fn monotonic_in_cpu() {
        let c = ceilings();
        let mut last = ConstraintLevel::None;
        for cpu in 0..=100 {
            let level = classify(&snapshot(f64::from(cpu), 0.0, 0), &c);
            assert!(level >= last, "level regressed at cpu={cpu}");
            last = level;
        }
    }

    #[test]
    fn zero_ceiling_treats_any_load_as_critical() {
        let mut c = ceilings();
        c.max_cpu_percent = 0.0;
        assert_eq!(
            classify(&snapshot(1.0, 0.0, 0), &c),
            ConstraintLevel::Critical
        );
        assert_eq!(classify(&snapshot(0.0, 0.0, 0), &c), ConstraintLevel::None);
    }

    #[test]
    fn level_ordering() {
        assert!(ConstraintLevel::Critical > ConstraintLevel::High);
        assert!(ConstraintLevel::High > ConstraintLevel::Medium);
        assert!(ConstraintLevel::Medium > ConstraintLevel::Low);
        assert!(ConstraintLevel::Low > ConstraintLevel::None);
    }
}
