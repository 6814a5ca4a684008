//! Configuration loading and merging.
//!
//! Defaults are compiled in; a global config file, a project config file,
//! and environment variables are layered on top in that order. Resource
//! constraints are additionally mutable at runtime through
//! [`crate::app::AppContext::update_constraints`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CgError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub constraints: ResourceConstraints,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

/// Hard ceilings the engine is allowed to approach, not OS totals.
/// Constraint levels are classified relative to these values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceConstraints {
    /// Maximum CPU utilization the engine should drive toward (percent).
    pub max_cpu_percent: f64,
    /// Maximum memory utilization the engine should drive toward (percent).
    pub max_memory_percent: f64,
    /// Largest batch accepted in one dispatch.
    pub max_batch_size: usize,
    /// Upper bound for the parallel worker pool.
    pub max_concurrent_tasks: usize,
}

impl Default for ResourceConstraints {
    fn default() -> Self {
        Self {
            max_cpu_percent: 80.0,
            max_memory_percent: 80.0,
            max_batch_size: 500,
            max_concurrent_tasks: 4,
        }
    }
}

impl ResourceConstraints {
    /// Range checks shared by config load and runtime updates.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.max_cpu_percent) {
            return Err(CgError::Config(format!(
                "max_cpu_percent out of range: {}",
                self.max_cpu_percent
            )));
        }
        if !(0.0..=100.0).contains(&self.max_memory_percent) {
            return Err(CgError::Config(format!(
                "max_memory_percent out of range: {}",
                self.max_memory_percent
            )));
        }
        if self.max_batch_size == 0 || self.max_concurrent_tasks == 0 {
            return Err(CgError::Config(
                "max_batch_size and max_concurrent_tasks must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between resource samples.
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,
    /// Ring buffer capacity for snapshot history.
    pub history_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(1),
            history_size: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Minimum fraction of a gap's examples a template instantiation must
    /// satisfy before it is accepted over the example-driven fallback.
    pub min_template_pass_rate: f64,
    /// Synthesis attempts before a gap is left open for manual review.
    pub max_attempts: u32,
    /// Minimum corpus F1 a candidate must reach to pass validation.
    pub min_corpus_f1: f64,
    /// Span-overlap similarity above which two skills are flagged.
    pub overlap_threshold: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_template_pass_rate: 0.8,
            max_attempts: 3,
            min_corpus_f1: 0.6,
            overlap_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Training samples required before the regression model is trusted.
    pub min_samples: usize,
    /// Bounded training history per strategy.
    pub history_size: usize,
    /// Confidence reported when falling back to the heuristic table.
    pub fallback_confidence: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_samples: 20,
            history_size: 1000,
            fallback_confidence: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the external PII analyzer, if one is deployed.
    pub endpoint: Option<String>,
    /// Per-request timeout for the analyzer.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CARDGUARD_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(Path::new("cardguard.toml"))? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("cardguard/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| CgError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| CgError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(constraints) = patch.constraints {
            self.constraints = constraints;
        }
        if let Some(monitor) = patch.monitor {
            self.monitor = monitor;
        }
        if let Some(generation) = patch.generation {
            self.generation = generation;
        }
        if let Some(predictor) = patch.predictor {
            self.predictor = predictor;
        }
        if let Some(analyzer) = patch.analyzer {
            self.analyzer = analyzer;
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var("CARDGUARD_MAX_CPU") {
            self.constraints.max_cpu_percent = parse_env("CARDGUARD_MAX_CPU", &raw)?;
        }
        if let Ok(raw) = std::env::var("CARDGUARD_MAX_MEMORY") {
            self.constraints.max_memory_percent = parse_env("CARDGUARD_MAX_MEMORY", &raw)?;
        }
        if let Ok(raw) = std::env::var("CARDGUARD_MAX_CONCURRENCY") {
            self.constraints.max_concurrent_tasks = parse_env("CARDGUARD_MAX_CONCURRENCY", &raw)?;
        }
        if let Ok(endpoint) = std::env::var("CARDGUARD_ANALYZER_URL") {
            if !endpoint.is_empty() {
                self.analyzer.endpoint = Some(endpoint);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.constraints.validate()?;
        if self.monitor.history_size == 0 {
            return Err(CgError::Config(
                "monitor.history_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| CgError::Config(format!("invalid value for {key}: {raw}")))
}

/// Partial config as read from a TOML file; absent sections keep defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    constraints: Option<ResourceConstraints>,
    monitor: Option<MonitorConfig>,
    generation: Option<GenerationConfig>,
    predictor: Option<PredictorConfig>,
    analyzer: Option<AnalyzerConfig>,
}
