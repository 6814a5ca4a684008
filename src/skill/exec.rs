//! Skill execution.
//!
//! A [`SkillSet`] is a dispatch table resolved once at batch start from a
//! registry snapshot: patterns are compiled and the analyzer client is
//! built up front, so per-item dispatch is a bounded walk over prepared
//! runners regardless of concurrent registry mutation.

use regex::Regex;
use serde::Deserialize;

use super::{Skill, SkillBody};
use crate::config::AnalyzerConfig;
use crate::detector::{self, Detection};
use crate::error::Result;

/// Detections produced by one skill over one text.
#[derive(Debug, Clone)]
pub struct SkillMatches {
    pub skill: String,
    pub detections: Vec<Detection>,
}

/// Prepared, immutable dispatch table for a batch.
pub struct SkillSet {
    prepared: Vec<PreparedSkill>,
}

struct PreparedSkill {
    name: String,
    runner: Runner,
}

enum Runner {
    Pattern { regex: Regex, require_luhn: bool },
    Analyzer { client: reqwest::blocking::Client, url: String },
}

/// Wire shape of one Presidio analyzer entity.
#[derive(Debug, Deserialize)]
struct AnalyzerEntity {
    start: usize,
    end: usize,
}

impl SkillSet {
    /// Compile a skill snapshot into a dispatch table.
    pub fn prepare(skills: &[Skill], analyzer: &AnalyzerConfig) -> Result<Self> {
        let mut prepared = Vec::with_capacity(skills.len());
        for skill in skills {
            let runner = match &skill.body {
                SkillBody::Pattern {
                    pattern,
                    require_luhn,
                } => Runner::Pattern {
                    regex: Regex::new(pattern)?,
                    require_luhn: *require_luhn,
                },
                SkillBody::Analyzer { endpoint } => Runner::Analyzer {
                    client: reqwest::blocking::Client::builder()
                        .timeout(analyzer.timeout)
                        .build()?,
                    url: endpoint.clone(),
                },
            };
            prepared.push(PreparedSkill {
                name: skill.name.clone(),
                runner,
            });
        }
        Ok(Self { prepared })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prepared.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prepared.is_empty()
    }

    /// Skill names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.prepared.iter().map(|p| p.name.clone()).collect()
    }

    /// Run every prepared skill over one text.
    ///
    /// Analyzer transport failures degrade to an empty result for that
    /// skill — the analyzer is a fallback detector, and an unreachable
    /// sidecar must not abort the batch.
    #[must_use]
    pub fn run_text(&self, text: &str) -> Vec<SkillMatches> {
        self.prepared
            .iter()
            .map(|prepared| SkillMatches {
                skill: prepared.name.clone(),
                detections: prepared.run(text),
            })
            .collect()
    }

    /// Run a subset of skills (by dispatch-order index) over one text.
    #[must_use]
    pub fn run_text_with(&self, text: &str, indices: &[usize]) -> Vec<SkillMatches> {
        indices
            .iter()
            .filter_map(|&i| self.prepared.get(i))
            .map(|prepared| SkillMatches {
                skill: prepared.name.clone(),
                detections: prepared.run(text),
            })
            .collect()
    }
}

impl PreparedSkill {
    fn run(&self, text: &str) -> Vec<Detection> {
        match &self.runner {
            Runner::Pattern {
                regex,
                require_luhn,
            } => run_pattern(regex, *require_luhn, text),
            Runner::Analyzer { client, url } => match run_analyzer(client, url, text) {
                Ok(detections) => detections,
                Err(err) => {
                    tracing::warn!(skill = %self.name, error = %err, "analyzer unavailable");
                    vec![]
                }
            },
        }
    }
}

fn run_pattern(regex: &Regex, require_luhn: bool, text: &str) -> Vec<Detection> {
    regex
        .find_iter(text)
        .filter_map(|m| {
            let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
            let valid = detector::luhn_check(&digits);
            if require_luhn && !valid {
                return None;
            }
            Some(Detection {
                start: m.start(),
                end: m.end(),
                raw: m.as_str().to_string(),
                network: detector::card_network(&digits),
                digits,
                valid,
            })
        })
        .collect()
}

fn run_analyzer(
    client: &reqwest::blocking::Client,
    url: &str,
    text: &str,
) -> Result<Vec<Detection>> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "text": text,
            "entities": ["CREDIT_CARD"],
        }))
        .send()?
        .error_for_status()?;

    // The analyzer returns either a bare entity array or an object
    // wrapping one under "entities"/"results".
    let body: serde_json::Value = response.json()?;
    let entities = body
        .as_array()
        .or_else(|| body.get("entities").and_then(|v| v.as_array()))
        .or_else(|| body.get("results").and_then(|v| v.as_array()))
        .cloned()
        .unwrap_or_default();

    let mut detections = Vec::with_capacity(entities.len());
    for value in entities {
        let Ok(entity) = serde_json::from_value::<AnalyzerEntity>(value) else {
            continue;
        };
        let Some(raw) = text.get(entity.start..entity.end) else {
            continue;
        };
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        detections.push(Detection {
            start: entity.start,
            end: entity.end,
            raw: raw.to_string(),
            valid: detector::luhn_check(&digits),
            network: detector::card_network(&digits),
            digits,
        });
    }
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::Skill;

    fn analyzer_config() -> AnalyzerConfig {
        AnalyzerConfig::default()
    }

    #[test]
    fn pattern_skill_detects_and_gates_on_luhn() {
        let strict = Skill::pattern("strict", r"(?:\d[ -]?){12,18}\d", true);
        let lax = Skill::pattern("lax", r"(?:\d[ -]?){12,18}\d", false);
        let set = SkillSet::prepare(&[strict, lax], &analyzer_config()).unwrap();

        let results = set.run_text("bad 1234 5678 9012 3456 good 4111111111111111");
        assert_eq!(results[0].skill, "strict");
        assert_eq!(results[0].detections.len(), 1);
        assert!(results[0].detections[0].valid);
        assert_eq!(results[1].detections.len(), 2);
    }

    #[test]
    fn invalid_pattern_fails_preparation() {
        let broken = Skill::pattern("broken", r"(unclosed", false);
        assert!(SkillSet::prepare(&[broken], &analyzer_config()).is_err());
    }

    #[test]
    fn subset_dispatch_respects_indices() {
        let a = Skill::pattern("a", r"\d{16}", false);
        let b = Skill::pattern("b", r"\d{13}", false);
        let set = SkillSet::prepare(&[a, b], &analyzer_config()).unwrap();

        let results = set.run_text_with("4111111111111111", &[0]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].skill, "a");
    }

    #[test]
    fn analyzer_skill_parses_entity_array() {
        let server = httpmock::MockServer::start();
        let text = "pay 4111111111111111 now";
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/analyze");
            then.status(200)
                .json_body(serde_json::json!([{ "start": 4, "end": 20, "score": 0.95, "entity_type": "CREDIT_CARD" }]));
        });

        let skill = Skill {
            body: SkillBody::Analyzer {
                endpoint: server.url("/analyze"),
            },
            ..Skill::pattern("presidio", "", false)
        };
        let set = SkillSet::prepare(&[skill], &analyzer_config()).unwrap();
        let results = set.run_text(text);

        mock.assert();
        assert_eq!(results[0].detections.len(), 1);
        assert_eq!(results[0].detections[0].digits, "4111111111111111");
        assert!(results[0].detections[0].valid);
    }

    #[test]
    fn analyzer_failure_degrades_to_empty() {
        let skill = Skill {
            body: SkillBody::Analyzer {
                endpoint: "http://127.0.0.1:1/analyze".to_string(),
            },
            ..Skill::pattern("presidio", "", false)
        };
        let set = SkillSet::prepare(&[skill], &analyzer_config()).unwrap();
        let results = set.run_text("4111111111111111");
        assert!(results[0].detections.is_empty());
    }
}
