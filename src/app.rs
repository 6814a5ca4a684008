//! Application wiring.
//!
//! `AppContext` owns the long-lived pieces: config, registry (seeded with
//! the built-in detector and, when configured, the external analyzer
//! fallback), the resource monitor, the predictor, and the strategy
//! selector. The CLI layer talks to this and nothing below it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ResourceConstraints};
use crate::conflict::{Conflict, ConflictResolver, Resolution};
use crate::engine::{BatchOutcome, BatchRequest, CancelToken, StrategySelector};
use crate::error::Result;
use crate::gaps::{self, GapReport, GenerationOutcome, LabeledExample, SkillGenerator};
use crate::monitor::{
    ConstraintLevel, ResourceMonitor, ResourceSnapshot, SysinfoProbe, WindowedAverage,
};
use crate::predict::PerformancePredictor;
use crate::skill::{Skill, SkillBody, SkillRegistry, SkillSet, SkillSummary};

/// Name of the always-registered built-in detector skill.
pub const BASE_SKILL: &str = "base-luhn";
/// Name of the optional external analyzer skill.
pub const ANALYZER_SKILL: &str = "analyzer-fallback";

/// Current engine state for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub snapshot: Option<ResourceSnapshot>,
    pub level: ConstraintLevel,
    pub window: Option<WindowedAverage>,
    pub constraints: ResourceConstraints,
    pub active_skills: usize,
}

/// A candidate rejected during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub gap: String,
    pub reason: String,
}

/// A candidate blocked on conflicts needing manual resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedCandidate {
    pub gap: String,
    pub conflicts: Vec<Conflict>,
}

/// Full result of one gap-analysis and generation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapAnalysisOutcome {
    pub report: GapReport,
    /// Names of newly registered skills.
    pub registered: Vec<String>,
    pub rejected: Vec<RejectedCandidate>,
    pub blocked: Vec<BlockedCandidate>,
    /// Gap signatures left open for manual review.
    pub unresolved: Vec<String>,
}

pub struct AppContext {
    pub config: Config,
    /// Machine-readable JSON output requested.
    pub robot_mode: bool,
    registry: Arc<SkillRegistry>,
    monitor: Arc<ResourceMonitor>,
    selector: StrategySelector,
    generator: SkillGenerator,
    resolver: ConflictResolver,
}

impl AppContext {
    /// Load config per the CLI flags and build the engine.
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let mut ctx = Self::init(config)?;
        ctx.robot_mode = cli.robot;
        Ok(ctx)
    }

    /// Build and seed the engine. The monitor's sampler thread is started
    /// here and stopped on drop.
    pub fn init(config: Config) -> Result<Self> {
        let registry = Arc::new(SkillRegistry::new());

        let mut base = Skill::pattern(BASE_SKILL, r"(?:\d[ -]?){12,18}\d", true);
        base.description = "digit-run scan with Luhn checksum".to_string();
        registry.register(base)?;

        if let Some(endpoint) = &config.analyzer.endpoint {
            let analyzer = Skill {
                description: "external PII analyzer fallback".to_string(),
                body: SkillBody::Analyzer {
                    endpoint: endpoint.clone(),
                },
                ..Skill::pattern(ANALYZER_SKILL, "", false)
            };
            registry.register(analyzer)?;
        }

        let monitor = Arc::new(ResourceMonitor::new(
            Arc::new(SysinfoProbe::new()),
            &config.monitor,
        ));
        monitor.start();

        let predictor = Arc::new(PerformancePredictor::new(config.predictor.clone()));
        let selector = StrategySelector::new(
            Arc::clone(&registry),
            Arc::clone(&monitor),
            predictor,
            config.constraints,
            config.analyzer.clone(),
        );

        Ok(Self {
            generator: SkillGenerator::new(config.generation.clone()),
            resolver: ConflictResolver::new(config.generation.clone(), config.analyzer.clone()),
            config,
            robot_mode: false,
            registry,
            monitor,
            selector,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Process one batch through the full state machine.
    pub fn process(&self, request: &BatchRequest, cancel: &CancelToken) -> Result<BatchOutcome> {
        self.selector.process(request, cancel)
    }

    #[must_use]
    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Current resource state, classification, and registry size.
    #[must_use]
    pub fn status(&self) -> StatusReport {
        let (snapshot, level) = self.selector.resource_state();
        StatusReport {
            snapshot,
            level,
            window: self.monitor.windowed_average(Duration::from_secs(60)),
            constraints: self.selector.constraints(),
            active_skills: self.registry.len(),
        }
    }

    #[must_use]
    pub fn list_skills(&self, min_f1: Option<f64>) -> Vec<SkillSummary> {
        match min_f1 {
            Some(threshold) => self.registry.list_by_quality(threshold),
            None => self.registry.list(),
        }
    }

    /// Submit labeled feedback for a named skill.
    pub fn submit_feedback(&self, skill: &str, tp: u64, fp: u64, fn_: u64) -> Result<()> {
        self.registry.record_outcome(skill, tp, fp, fn_)
    }

    /// Replace the resource ceilings at runtime.
    pub fn update_constraints(&self, constraints: ResourceConstraints) -> Result<()> {
        self.selector.update_constraints(constraints)
    }

    /// Run gap analysis over a labeled corpus, synthesize candidates for
    /// the gaps found, validate and resolve them, and register the
    /// survivors. Every non-registered candidate is reported, never
    /// silently dropped.
    pub fn run_gap_analysis(&self, corpus: &[LabeledExample]) -> Result<GapAnalysisOutcome> {
        let set = SkillSet::prepare(&self.registry.snapshot_active(), &self.config.analyzer)?;
        let report = gaps::find_gaps(&set, corpus);

        let mut registered = Vec::new();
        let mut rejected = Vec::new();
        let mut blocked = Vec::new();
        let mut unresolved = Vec::new();

        for gap in &report.gaps {
            match self.generator.generate(gap) {
                GenerationOutcome::Generated { skill, .. } => {
                    match self.resolver.resolve(skill, &self.registry, corpus) {
                        Ok(Resolution::Resolved { skill, .. }) => {
                            let name = skill.name.clone();
                            self.registry.register(skill)?;
                            registered.push(name);
                        }
                        Ok(Resolution::Blocked { conflicts }) => {
                            blocked.push(BlockedCandidate {
                                gap: gap.signature.clone(),
                                conflicts,
                            });
                        }
                        Err(err) => {
                            rejected.push(RejectedCandidate {
                                gap: gap.signature.clone(),
                                reason: err.to_string(),
                            });
                        }
                    }
                }
                GenerationOutcome::Unresolved { signature, .. } => {
                    unresolved.push(signature);
                }
            }
        }

        Ok(GapAnalysisOutcome {
            report,
            registered,
            rejected,
            blocked,
            unresolved,
        })
    }

    /// Stop background work. Also runs on drop.
    pub fn shutdown(&self) {
        self.monitor.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::Span;

    fn context() -> AppContext {
        AppContext::init(Config::default()).unwrap()
    }

    #[test]
    fn init_seeds_base_skill() {
        let app = context();
        assert!(app.registry().contains(BASE_SKILL));
        assert!(!app.registry().contains(ANALYZER_SKILL));
    }

    #[test]
    fn analyzer_endpoint_seeds_fallback_skill() {
        let mut config = Config::default();
        config.analyzer.endpoint = Some("http://127.0.0.1:9999/analyze".to_string());
        let app = AppContext::init(config).unwrap();
        assert!(app.registry().contains(ANALYZER_SKILL));
    }

    #[test]
    fn status_reports_level_and_skill_count() {
        let app = context();
        let status = app.status();
        assert_eq!(status.active_skills, 1);
        assert!(status.snapshot.is_some());
    }

    #[test]
    fn feedback_reaches_the_registry() {
        let app = context();
        app.submit_feedback(BASE_SKILL, 3, 1, 0).unwrap();
        let entry = app.registry().get(BASE_SKILL).unwrap();
        assert_eq!(entry.record.true_positives, 3);
    }

    #[test]
    fn gap_analysis_registers_generated_skill() {
        let app = context();
        // Dot-separated cards are outside the base pattern
        let corpus: Vec<LabeledExample> = (0..3)
            .map(|i| LabeledExample {
                text: format!("row {i}: 4111.1111.1111.1111 end"),
                expected: vec![Span::new(7, 26)],
            })
            .map(|mut ex| {
                let start = ex.text.find("4111").unwrap();
                ex.expected = vec![Span::new(start, start + 19)];
                ex
            })
            .collect();

        let outcome = app.run_gap_analysis(&corpus).unwrap();
        assert_eq!(outcome.registered.len(), 1);
        assert!(app.registry().contains(&outcome.registered[0]));

        // A second pass over the same corpus finds nothing left to do
        let second = app.run_gap_analysis(&corpus).unwrap();
        assert!(second.report.gaps.is_empty());
        assert!(second.registered.is_empty());
    }

    #[test]
    fn constraint_update_is_visible_in_status() {
        let app = context();
        let mut constraints = app.status().constraints;
        constraints.max_concurrent_tasks = 2;
        app.update_constraints(constraints).unwrap();
        assert_eq!(app.status().constraints.max_concurrent_tasks, 2);
    }
}
