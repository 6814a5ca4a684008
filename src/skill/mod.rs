//! Skill data structures.
//!
//! A skill is a named, versioned unit of detection logic with its own test
//! cases, declared capability requirements, and a running performance
//! record. The registry owns skill and record lifetimes; execution resolves
//! a dispatch table from a snapshot of the active set at batch start.

pub mod exec;
pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CgError, Result};

pub use exec::{SkillMatches, SkillSet};
pub use registry::{SkillRegistry, SkillSummary};

/// A named detection routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    /// Unique name within the registry's active set.
    pub name: String,
    /// Bumped on explicit replacement.
    pub version: u32,
    /// Short description.
    pub description: String,
    /// Executable body, opaque to the engine outside of dispatch.
    pub body: SkillBody,
    /// Ordered test cases the skill must pass before merge.
    pub test_cases: Vec<SkillTestCase>,
    /// Declared capability requirements (`name` or `name=value`).
    pub requires: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Skill {
    /// Create a pattern skill with no tests or capability requirements.
    pub fn pattern(name: impl Into<String>, pattern: impl Into<String>, require_luhn: bool) -> Self {
        Self {
            name: name.into(),
            version: 1,
            description: String::new(),
            body: SkillBody::Pattern {
                pattern: pattern.into(),
                require_luhn,
            },
            test_cases: vec![],
            requires: vec![],
            created_at: Utc::now(),
        }
    }

    /// Structural checks run before a skill enters the registry. Pattern
    /// compilation and test execution are the validator's job; this rejects
    /// only skills that could never dispatch.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CgError::InvalidSkill("skill name is empty".to_string()));
        }
        match &self.body {
            SkillBody::Pattern { pattern, .. } if pattern.is_empty() => Err(CgError::InvalidSkill(
                format!("skill `{}` has an empty pattern", self.name),
            )),
            SkillBody::Analyzer { endpoint } if endpoint.is_empty() => Err(CgError::InvalidSkill(
                format!("skill `{}` has an empty analyzer endpoint", self.name),
            )),
            _ => Ok(()),
        }
    }
}

/// Executable body of a skill.
///
/// Modeled as a tagged variant rather than an opaque callable so dispatch
/// stays bounded and predictable: the set is resolved once per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillBody {
    /// Regex scan with optional Luhn gate.
    Pattern { pattern: String, require_luhn: bool },
    /// External PII analyzer (Presidio analyzer REST contract). Treated as
    /// just another skill implementation, tracked like the rest.
    Analyzer { endpoint: String },
}

/// One test case: input text and the spans a correct skill must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTestCase {
    pub input: String,
    pub expected: Vec<Span>,
}

/// A half-open byte span in some input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether two spans share at least one byte.
    #[must_use]
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Running true/false-positive counters for one skill.
///
/// Counts only move up between explicit resets; precision, recall, and F1
/// are always derived from the counts, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl PerformanceRecord {
    /// Add outcome counts. The only mutation path outside `reset`.
    pub fn record(&mut self, tp: u64, fp: u64, fn_: u64) {
        self.true_positives += tp;
        self.false_positives += fp;
        self.false_negatives += fn_;
        self.last_updated = Some(Utc::now());
    }

    /// Zero all counters, keeping the update timestamp.
    pub fn reset(&mut self) {
        self.true_positives = 0;
        self.false_positives = 0;
        self.false_negatives = 0;
        self.last_updated = Some(Utc::now());
    }

    /// Precision, or `None` when nothing was ever predicted.
    #[must_use]
    pub fn precision(&self) -> Option<f64> {
        let predicted = self.true_positives + self.false_positives;
        (predicted > 0).then(|| self.true_positives as f64 / predicted as f64)
    }

    /// Recall, or `None` when there were no actual positives.
    #[must_use]
    pub fn recall(&self) -> Option<f64> {
        let actual = self.true_positives + self.false_negatives;
        (actual > 0).then(|| self.true_positives as f64 / actual as f64)
    }

    /// F1 derived from the counts. `None` (never NaN) when all counts are
    /// zero or when precision and recall are both zero.
    #[must_use]
    pub fn f1(&self) -> Option<f64> {
        let p = self.precision()?;
        let r = self.recall()?;
        if p + r == 0.0 {
            return None;
        }
        Some(2.0 * p * r / (p + r))
    }

    /// Reporting-only letter grade. Never used for control decisions.
    #[must_use]
    pub fn grade(&self) -> Option<QualityGrade> {
        self.f1().map(QualityGrade::from_f1)
    }
}

/// Deterministic bucketing of F1 into letter grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    #[must_use]
    pub fn from_f1(f1: f64) -> Self {
        if f1 >= 0.9 {
            Self::A
        } else if f1 >= 0.8 {
            Self::B
        } else if f1 >= 0.7 {
            Self::C
        } else if f1 >= 0.5 {
            Self::D
        } else {
            Self::F
        }
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::F => 'F',
        };
        write!(f, "{c}")
    }
}
