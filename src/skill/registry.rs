//! Skill registry: the single owner of skill and performance-record state.
//!
//! All counter updates go through [`SkillRegistry::record_outcome`], which
//! increments under the registry lock so concurrently completing batches
//! never lose updates. Deprecation keeps the full entry in a retired list
//! as an audit trail and frees the name for re-registration.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{PerformanceRecord, QualityGrade, Skill};
use crate::error::{CgError, Result};

/// One registered skill together with its mutable performance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub skill: Skill,
    pub record: PerformanceRecord,
}

/// Listing row for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSummary {
    pub name: String,
    pub version: u32,
    pub description: String,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub grade: Option<QualityGrade>,
    pub active: bool,
}

impl SkillSummary {
    fn from_entry(entry: &SkillEntry, active: bool) -> Self {
        Self {
            name: entry.skill.name.clone(),
            version: entry.skill.version,
            description: entry.skill.description.clone(),
            true_positives: entry.record.true_positives,
            false_positives: entry.record.false_positives,
            false_negatives: entry.record.false_negatives,
            precision: entry.record.precision(),
            recall: entry.record.recall(),
            f1: entry.record.f1(),
            grade: entry.record.grade(),
            active,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    active: HashMap<String, SkillEntry>,
    retired: Vec<SkillEntry>,
}

/// Thread-safe registry of detection skills.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    state: RwLock<RegistryState>,
}

impl SkillRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new skill. Fails for a structurally invalid skill or when
    /// a live skill already holds the name.
    pub fn register(&self, skill: Skill) -> Result<()> {
        skill.validate()?;
        let mut state = self.state.write();
        if state.active.contains_key(&skill.name) {
            return Err(CgError::DuplicateSkillName(skill.name));
        }
        tracing::info!(skill = %skill.name, version = skill.version, "registered skill");
        state.active.insert(
            skill.name.clone(),
            SkillEntry {
                skill,
                record: PerformanceRecord::default(),
            },
        );
        Ok(())
    }

    /// Explicitly replace a live skill, bumping its version and resetting
    /// its counters. The replaced entry is retired, not dropped.
    pub fn replace(&self, mut skill: Skill) -> Result<()> {
        skill.validate()?;
        let mut state = self.state.write();
        let old = state
            .active
            .remove(&skill.name)
            .ok_or_else(|| CgError::SkillNotFound(skill.name.clone()))?;
        skill.version = old.skill.version + 1;
        tracing::info!(skill = %skill.name, version = skill.version, "replaced skill");
        state.retired.push(old);
        state.active.insert(
            skill.name.clone(),
            SkillEntry {
                skill,
                record: PerformanceRecord::default(),
            },
        );
        Ok(())
    }

    /// Mark a skill inactive, preserving its history for audit.
    pub fn deprecate(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        let entry = state
            .active
            .remove(name)
            .ok_or_else(|| CgError::SkillNotFound(name.to_string()))?;
        tracing::info!(skill = name, "deprecated skill");
        state.retired.push(entry);
        Ok(())
    }

    /// Atomically add outcome counts for a named skill.
    pub fn record_outcome(&self, name: &str, tp: u64, fp: u64, fn_: u64) -> Result<()> {
        let mut state = self.state.write();
        let entry = state
            .active
            .get_mut(name)
            .ok_or_else(|| CgError::SkillNotFound(name.to_string()))?;
        entry.record.record(tp, fp, fn_);
        Ok(())
    }

    /// Reset one skill's counters.
    pub fn reset_counters(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        let entry = state
            .active
            .get_mut(name)
            .ok_or_else(|| CgError::SkillNotFound(name.to_string()))?;
        entry.record.reset();
        Ok(())
    }

    /// Clone of one live entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SkillEntry> {
        self.state.read().active.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().active.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().active.is_empty()
    }

    /// Snapshot of the active skill set for batch dispatch. Taken once at
    /// batch start so registry mutation mid-batch cannot tear dispatch.
    #[must_use]
    pub fn snapshot_active(&self) -> Vec<Skill> {
        let state = self.state.read();
        let mut skills: Vec<Skill> = state.active.values().map(|e| e.skill.clone()).collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    /// All skills, active first, for reporting.
    #[must_use]
    pub fn list(&self) -> Vec<SkillSummary> {
        let state = self.state.read();
        let mut rows: Vec<SkillSummary> = state
            .active
            .values()
            .map(|e| SkillSummary::from_entry(e, true))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        let mut retired: Vec<SkillSummary> = state
            .retired
            .iter()
            .map(|e| SkillSummary::from_entry(e, false))
            .collect();
        retired.sort_by(|a, b| a.name.cmp(&b.name));
        rows.extend(retired);
        rows
    }

    /// Live skills at or above an F1 threshold, best first; ties broken by
    /// ascending name for determinism. Skills without a defined F1 are
    /// excluded.
    #[must_use]
    pub fn list_by_quality(&self, min_f1: f64) -> Vec<SkillSummary> {
        let state = self.state.read();
        let mut rows: Vec<SkillSummary> = state
            .active
            .values()
            .filter(|e| e.record.f1().is_some_and(|f1| f1 >= min_f1))
            .map(|e| SkillSummary::from_entry(e, true))
            .collect();
        rows.sort_by(|a, b| {
            let fa = a.f1.unwrap_or(0.0);
            let fb = b.f1.unwrap_or(0.0);
            fb.partial_cmp(&fa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        rows
    }
}
