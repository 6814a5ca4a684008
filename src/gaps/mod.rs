//! Detection gap analysis.
//!
//! A gap is a cluster of labeled spans the current skill set fails to
//! detect. Misses are clustered by the shape of the missed text (digit runs
//! and separators), so twenty misses of the same unseen format surface as
//! one gap whose severity reflects the cluster size.

pub mod generate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::skill::{SkillSet, Span};

pub use generate::{GenerationOutcome, SkillGenerator};

/// A labeled corpus item: text plus the spans a correct engine must find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub text: String,
    pub expected: Vec<Span>,
}

/// One span where the skill set and the labels disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedDetection {
    /// The disputed text itself, separators included.
    pub raw: String,
    pub span: Span,
}

/// Direction of the disagreement a gap describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// A labeled span no active skill detected.
    MissedSpan,
    /// A detection overlapping no labeled span.
    SpuriousMatch,
}

/// Severity score in [0, 1], driven by how often the gap's shape was
/// missed. Saturates at ten same-shaped misses.
#[must_use]
pub fn severity_of(miss_count: usize) -> f64 {
    (miss_count as f64 / 10.0).min(1.0)
}

/// A cluster of same-shaped disagreements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    /// Stable identifier derived from the kind and shape.
    pub signature: String,
    /// Human-readable shape, digits collapsed to `d`.
    pub shape: String,
    pub kind: GapKind,
    /// In [0, 1], higher for larger clusters.
    pub severity: f64,
    pub examples: Vec<MissedDetection>,
}

/// Outcome of one gap-analysis pass over a labeled corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapReport {
    pub gaps: Vec<Gap>,
    pub total_expected: usize,
    pub total_missed: usize,
}

impl GapReport {
    /// Fraction of expected spans the skill set covered.
    #[must_use]
    pub fn coverage(&self) -> Option<f64> {
        (self.total_expected > 0)
            .then(|| 1.0 - self.total_missed as f64 / self.total_expected as f64)
    }
}

/// Collapse text into its detection shape: digits become `d`, space and
/// dash separators are kept, everything else becomes `x`.
#[must_use]
pub fn shape_of(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '0'..='9' => 'd',
            ' ' | '-' => c,
            _ => 'x',
        })
        .collect()
}

/// Short stable signature for a shape.
#[must_use]
pub fn signature_of(shape: &str) -> String {
    let digest = Sha256::digest(shape.as_bytes());
    hex::encode(&digest[..4])
}

fn record_miss(
    clusters: &mut BTreeMap<(GapKind, String), Vec<MissedDetection>>,
    kind: GapKind,
    example: &LabeledExample,
    span: Span,
) {
    let Some(raw) = example.text.get(span.start..span.end) else {
        tracing::warn!(
            start = span.start,
            end = span.end,
            "span out of bounds for its text, skipping"
        );
        return;
    };
    clusters
        .entry((kind, shape_of(raw)))
        .or_default()
        .push(MissedDetection {
            raw: raw.to_string(),
            span,
        });
}

/// Run the skill set over a labeled corpus and cluster the disagreements.
///
/// A labeled span counts as covered when any skill's detection overlaps it;
/// a detection overlapping no labeled span is spurious. Both directions
/// cluster by shape. Gaps are ordered by descending severity, ties broken
/// by signature, so repeated runs over the same corpus report identically.
#[must_use]
pub fn find_gaps(skills: &SkillSet, corpus: &[LabeledExample]) -> GapReport {
    let mut clusters: BTreeMap<(GapKind, String), Vec<MissedDetection>> = BTreeMap::new();
    let mut total_expected = 0usize;
    let mut total_missed = 0usize;

    for example in corpus {
        let detected: Vec<Span> = skills
            .run_text(&example.text)
            .into_iter()
            .flat_map(|m| m.detections)
            .map(|d| Span::new(d.start, d.end))
            .collect();

        for expected in &example.expected {
            total_expected += 1;
            if detected.iter().any(|d| d.overlaps(expected)) {
                continue;
            }
            total_missed += 1;
            record_miss(&mut clusters, GapKind::MissedSpan, example, *expected);
        }

        for span in &detected {
            if !example.expected.iter().any(|e| e.overlaps(span)) {
                record_miss(&mut clusters, GapKind::SpuriousMatch, example, *span);
            }
        }
    }

    let mut gaps: Vec<Gap> = clusters
        .into_iter()
        .map(|((kind, shape), examples)| Gap {
            signature: signature_of(&format!("{kind:?}:{shape}")),
            severity: severity_of(examples.len()),
            shape,
            kind,
            examples,
        })
        .collect();
    gaps.sort_by(|a, b| {
        b.severity
            .partial_cmp(&a.severity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.signature.cmp(&b.signature))
    });

    GapReport {
        gaps,
        total_expected,
        total_missed,
    }
}
