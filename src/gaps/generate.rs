//! Skill synthesis from detected gaps.
//!
//! Synthesizers are tried in a fixed order: the template synthesizer first
//! (known digit-group shapes, tight patterns), then the example-driven one
//! (generalizes directly from the missed text). Attempts are bounded; a gap
//! no synthesizer can cover is returned unresolved for manual review.
//! Generated candidates are never registered here — they go through
//! conflict validation first.

use itertools::Itertools;
use regex::Regex;

use super::Gap;
use crate::config::{AnalyzerConfig, GenerationConfig};
use crate::detector::luhn_check;
use crate::skill::{Skill, SkillBody, SkillSet, SkillTestCase, Span};

/// A strategy for turning one gap into a candidate skill.
pub trait SkillSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce a candidate, or `None` when this synthesizer cannot cover
    /// the gap's shape.
    fn synthesize(&self, gap: &Gap, config: &GenerationConfig) -> Option<Skill>;
}

/// Result of one generation attempt for one gap.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// A candidate passed its own derived tests. Still unvalidated against
    /// the wider corpus and unregistered.
    Generated {
        skill: Skill,
        synthesizer: &'static str,
        attempts: u32,
    },
    /// No synthesizer produced a passing candidate within the attempt
    /// budget. The gap stays open.
    Unresolved { signature: String, attempts: u32 },
}

/// Fixed-order synthesis pipeline.
pub struct SkillGenerator {
    synthesizers: Vec<Box<dyn SkillSynthesizer>>,
    config: GenerationConfig,
}

impl SkillGenerator {
    #[must_use]
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            synthesizers: vec![
                Box::new(TemplateSynthesizer),
                Box::new(ExampleSynthesizer),
            ],
            config,
        }
    }

    /// Try each synthesizer in order until a candidate passes its own
    /// derived tests, within the configured attempt budget.
    #[must_use]
    pub fn generate(&self, gap: &Gap) -> GenerationOutcome {
        // Spurious-match gaps need suppression, not a new pattern; they are
        // always left for manual review.
        if gap.kind == super::GapKind::SpuriousMatch {
            return GenerationOutcome::Unresolved {
                signature: gap.signature.clone(),
                attempts: 0,
            };
        }

        let mut attempts = 0u32;
        for synthesizer in &self.synthesizers {
            if attempts >= self.config.max_attempts {
                break;
            }
            attempts += 1;
            let Some(skill) = synthesizer.synthesize(gap, &self.config) else {
                continue;
            };
            if passes_own_tests(&skill) {
                tracing::info!(
                    gap = %gap.signature,
                    skill = %skill.name,
                    synthesizer = synthesizer.name(),
                    "synthesized candidate skill"
                );
                return GenerationOutcome::Generated {
                    skill,
                    synthesizer: synthesizer.name(),
                    attempts,
                };
            }
        }
        tracing::warn!(gap = %gap.signature, attempts, "gap left unresolved");
        GenerationOutcome::Unresolved {
            signature: gap.signature.clone(),
            attempts,
        }
    }
}

/// Run a candidate against its own test cases in isolation.
fn passes_own_tests(skill: &Skill) -> bool {
    let Ok(set) = SkillSet::prepare(std::slice::from_ref(skill), &AnalyzerConfig::default()) else {
        return false;
    };
    skill.test_cases.iter().all(|case| {
        let detected: Vec<Span> = set
            .run_text(&case.input)
            .into_iter()
            .flat_map(|m| m.detections)
            .map(|d| Span::new(d.start, d.end))
            .collect();
        case.expected
            .iter()
            .all(|span| detected.iter().any(|d| d.overlaps(span)))
    })
}

fn candidate(gap: &Gap, pattern: String) -> Skill {
    // Require the checksum only when every missed example satisfies it;
    // otherwise the gate would re-create the gap for labeled non-Luhn data.
    let require_luhn = gap.examples.iter().all(|m| {
        let digits: String = m.raw.chars().filter(char::is_ascii_digit).collect();
        luhn_check(&digits)
    });
    Skill {
        name: format!("gap-{}", gap.signature),
        version: 1,
        description: format!("generated for missed shape `{}`", gap.shape),
        body: SkillBody::Pattern {
            pattern,
            require_luhn,
        },
        test_cases: gap
            .examples
            .iter()
            .map(|m| SkillTestCase {
                input: m.raw.clone(),
                expected: vec![Span::new(0, m.raw.len())],
            })
            .collect(),
        requires: vec![],
        created_at: chrono::Utc::now(),
    }
}

/// Synthesizer for the common card shape: uniform digit groups joined by a
/// single repeated separator character.
pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    /// Split raw missed text into digit-run lengths and a single separator.
    /// Returns `None` for anything irregular.
    fn structure(raw: &str) -> Option<(Vec<usize>, Option<char>)> {
        let mut groups = vec![];
        let mut current = 0usize;
        let mut separator: Option<char> = None;
        for c in raw.chars() {
            if c.is_ascii_digit() {
                current += 1;
            } else {
                if current == 0 {
                    return None;
                }
                match separator {
                    None => separator = Some(c),
                    Some(s) if s == c => {}
                    Some(_) => return None,
                }
                groups.push(current);
                current = 0;
            }
        }
        if current == 0 {
            return None;
        }
        groups.push(current);
        Some((groups, separator))
    }
}

impl SkillSynthesizer for TemplateSynthesizer {
    fn name(&self) -> &'static str {
        "template"
    }

    fn synthesize(&self, gap: &Gap, config: &GenerationConfig) -> Option<Skill> {
        let (groups, separator) = Self::structure(&gap.examples.first()?.raw)?;
        let sep = separator
            .map(|c| regex::escape(&c.to_string()))
            .unwrap_or_default();
        let pattern = groups
            .iter()
            .map(|len| format!(r"\d{{{len}}}"))
            .collect::<Vec<_>>()
            .join(&sep);

        // The template must actually cover the cluster it was derived from
        let regex = Regex::new(&pattern).ok()?;
        let passing = gap
            .examples
            .iter()
            .filter(|m| regex.find(&m.raw).is_some_and(|f| f.as_str() == m.raw))
            .count();
        let pass_rate = passing as f64 / gap.examples.len() as f64;
        if pass_rate < config.min_template_pass_rate {
            return None;
        }

        Some(candidate(gap, pattern))
    }
}

/// Fallback synthesizer: generalize each missed example into a pattern
/// (digit runs become `\d{n}`, other characters are escaped) and join the
/// distinct patterns into one alternation.
pub struct ExampleSynthesizer;

impl ExampleSynthesizer {
    fn generalize(raw: &str) -> String {
        let mut pattern = String::new();
        let mut run = 0usize;
        for c in raw.chars() {
            if c.is_ascii_digit() {
                run += 1;
            } else {
                if run > 0 {
                    pattern.push_str(&format!(r"\d{{{run}}}"));
                    run = 0;
                }
                pattern.push_str(&regex::escape(&c.to_string()));
            }
        }
        if run > 0 {
            pattern.push_str(&format!(r"\d{{{run}}}"));
        }
        pattern
    }
}

impl SkillSynthesizer for ExampleSynthesizer {
    fn name(&self) -> &'static str {
        "example"
    }

    fn synthesize(&self, gap: &Gap, _config: &GenerationConfig) -> Option<Skill> {
        let mut patterns: Vec<String> = gap
            .examples
            .iter()
            .map(|m| Self::generalize(&m.raw))
            .sorted()
            .dedup()
            .collect();
        if patterns.is_empty() {
            return None;
        }
        let pattern = if patterns.len() == 1 {
            patterns.remove(0)
        } else {
            format!("(?:{})", patterns.join("|"))
        };
        Some(candidate(gap, pattern))
    }
}
