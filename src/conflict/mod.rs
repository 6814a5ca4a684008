//! Candidate validation and conflict resolution.
//!
//! Every candidate skill passes through here before it may reach the
//! registry: it must pass its own test cases, clear the corpus F1 floor,
//! and survive conflict detection against the live skill set. Name
//! collisions are auto-resolved by suffixing; functionality overlap is
//! auto-resolved only when the candidate strictly supersedes the incumbent;
//! capability conflicts are always surfaced for a human.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{AnalyzerConfig, GenerationConfig};
use crate::error::{CgError, Result};
use crate::gaps::LabeledExample;
use crate::skill::{PerformanceRecord, Skill, SkillRegistry, SkillSet, Span};

/// Category of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    NameCollision,
    FunctionalityOverlap,
    CapabilityConflict,
}

/// One conflict between a candidate and a live skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Name of the live skill involved.
    pub with: String,
    pub detail: String,
    pub auto_resolvable: bool,
}

/// Outcome of resolving a candidate against the live skill set.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Safe to register, possibly renamed. Auto-resolved conflicts are
    /// carried for reporting.
    Resolved {
        skill: Skill,
        resolved: Vec<Conflict>,
    },
    /// At least one conflict needs a human decision.
    Blocked { conflicts: Vec<Conflict> },
}

/// Corpus scoring of one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub f1: Option<f64>,
}

pub struct ConflictResolver {
    config: GenerationConfig,
    analyzer: AnalyzerConfig,
}

impl ConflictResolver {
    #[must_use]
    pub fn new(config: GenerationConfig, analyzer: AnalyzerConfig) -> Self {
        Self { config, analyzer }
    }

    /// Validate a candidate in isolation: own tests, then corpus F1.
    pub fn validate(
        &self,
        candidate: &Skill,
        corpus: &[LabeledExample],
    ) -> Result<ValidationReport> {
        let set = SkillSet::prepare(std::slice::from_ref(candidate), &self.analyzer)?;

        for (i, case) in candidate.test_cases.iter().enumerate() {
            let detected = spans_for(&set, &case.input);
            let covered = case
                .expected
                .iter()
                .all(|span| detected.iter().any(|d| d.overlaps(span)));
            if !covered {
                return Err(CgError::ValidationFailed(format!(
                    "skill `{}` failed its own test case {i}",
                    candidate.name
                )));
            }
        }

        let mut record = PerformanceRecord::default();
        for example in corpus {
            let detected = spans_for(&set, &example.text);
            let (tp, fp, fn_) = score_spans(&detected, &example.expected);
            record.record(tp, fp, fn_);
        }

        let f1 = record.f1();
        if !corpus.is_empty() && f1.unwrap_or(0.0) < self.config.min_corpus_f1 {
            return Err(CgError::ValidationFailed(format!(
                "skill `{}` corpus F1 {:.3} below floor {:.3}",
                candidate.name,
                f1.unwrap_or(0.0),
                self.config.min_corpus_f1
            )));
        }

        Ok(ValidationReport {
            true_positives: record.true_positives,
            false_positives: record.false_positives,
            false_negatives: record.false_negatives,
            f1,
        })
    }

    /// Validate a candidate and resolve it against the live skill set.
    ///
    /// The returned skill is NOT registered; registration stays with the
    /// caller so blocked candidates can be reported instead of dropped.
    pub fn resolve(
        &self,
        mut candidate: Skill,
        registry: &SkillRegistry,
        corpus: &[LabeledExample],
    ) -> Result<Resolution> {
        self.validate(&candidate, corpus)?;

        let mut resolved = Vec::new();
        let mut blocking = Vec::new();

        if registry.contains(&candidate.name) {
            let renamed = format!("{}-{}", candidate.name, body_fingerprint(&candidate));
            if registry.contains(&renamed) {
                // Same name, same body: a duplicate of a registered skill,
                // which no rename or human decision can turn into a new one
                return Err(CgError::UnresolvableConflict(format!(
                    "candidate `{}` duplicates registered skill `{renamed}`",
                    candidate.name
                )));
            }
            tracing::info!(from = %candidate.name, to = %renamed, "auto-resolved name collision");
            resolved.push(Conflict {
                kind: ConflictKind::NameCollision,
                with: candidate.name.clone(),
                detail: format!("renamed candidate to `{renamed}`"),
                auto_resolvable: true,
            });
            candidate.name = renamed;
        }

        for live in registry.snapshot_active() {
            self.check_overlap(&candidate, &live, corpus, &mut resolved, &mut blocking)?;
            check_capabilities(&candidate, &live, &mut blocking);
        }

        if blocking.is_empty() {
            Ok(Resolution::Resolved {
                skill: candidate,
                resolved,
            })
        } else {
            blocking.extend(resolved);
            Ok(Resolution::Blocked {
                conflicts: blocking,
            })
        }
    }

    /// Compare candidate and live detections over the corpus. High span
    /// similarity is a functionality overlap; it auto-resolves only when
    /// the candidate strictly supersedes the live skill. The resolution is
    /// deliberately one-directional: a live skill subsuming the candidate
    /// still blocks, because dropping a weaker candidate silently would
    /// hide it from the caller, and retiring the incumbent instead is a
    /// reviewer's call.
    fn check_overlap(
        &self,
        candidate: &Skill,
        live: &Skill,
        corpus: &[LabeledExample],
        resolved: &mut Vec<Conflict>,
        blocking: &mut Vec<Conflict>,
    ) -> Result<()> {
        if corpus.is_empty() {
            return Ok(());
        }
        let candidate_set = SkillSet::prepare(std::slice::from_ref(candidate), &self.analyzer)?;
        let live_set = SkillSet::prepare(std::slice::from_ref(live), &self.analyzer)?;

        let mut candidate_total = 0usize;
        let mut live_total = 0usize;
        let mut live_covered = 0usize;

        for example in corpus {
            let candidate_spans = spans_for(&candidate_set, &example.text);
            let live_spans = spans_for(&live_set, &example.text);
            candidate_total += candidate_spans.len();
            live_total += live_spans.len();
            live_covered += live_spans
                .iter()
                .filter(|l| candidate_spans.iter().any(|c| c.overlaps(l)))
                .count();
        }

        if candidate_total + live_total == 0 {
            return Ok(());
        }
        let similarity = 2.0 * live_covered as f64 / (candidate_total + live_total) as f64;
        if similarity < self.config.overlap_threshold {
            return Ok(());
        }

        let strict_superset = live_covered == live_total && candidate_total > live_total;
        let conflict = Conflict {
            kind: ConflictKind::FunctionalityOverlap,
            with: live.name.clone(),
            detail: format!("span similarity {similarity:.2} with `{}`", live.name),
            auto_resolvable: strict_superset,
        };
        if strict_superset {
            tracing::info!(
                candidate = %candidate.name,
                live = %live.name,
                similarity,
                "candidate strictly supersedes live skill"
            );
            resolved.push(conflict);
        } else {
            blocking.push(conflict);
        }
        Ok(())
    }
}

/// Capability requirements use `name` or `name=value`. Two skills conflict
/// when they pin the same capability to different values.
fn check_capabilities(candidate: &Skill, live: &Skill, blocking: &mut Vec<Conflict>) {
    for req in &candidate.requires {
        let (name, value) = split_capability(req);
        let Some(value) = value else { continue };
        for other in &live.requires {
            let (other_name, other_value) = split_capability(other);
            if name == other_name && other_value.is_some_and(|v| v != value) {
                blocking.push(Conflict {
                    kind: ConflictKind::CapabilityConflict,
                    with: live.name.clone(),
                    detail: format!("capability `{name}` pinned to `{value}` vs `{other}`"),
                    auto_resolvable: false,
                });
            }
        }
    }
}

fn split_capability(req: &str) -> (&str, Option<&str>) {
    match req.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (req, None),
    }
}

fn body_fingerprint(skill: &Skill) -> String {
    let body = serde_json::to_vec(&skill.body).unwrap_or_default();
    let digest = Sha256::digest(&body);
    hex::encode(&digest[..3])
}

fn spans_for(set: &SkillSet, text: &str) -> Vec<Span> {
    set.run_text(text)
        .into_iter()
        .flat_map(|m| m.detections)
        .map(|d| Span::new(d.start, d.end))
        .collect()
}

/// Score detected spans against labeled spans by overlap.
pub(crate) fn score_spans(detected: &[Span], expected: &[Span]) -> (u64, u64, u64) {
    let tp = detected
        .iter()
        .filter(|d| expected.iter().any(|e| e.overlaps(d)))
        .count() as u64;
    let fp = detected.len() as u64 - tp;
    let fn_ = expected
        .iter()
        .filter(|e| !detected.iter().any(|d| d.overlaps(e)))
        .count() as u64;
    (tp, fp, fn_)
}
