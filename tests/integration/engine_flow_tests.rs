//! Cross-component flows: monitor, classifier, predictor, and selector
//! working against one registry.

use std::sync::Arc;

use cardguard::config::{AnalyzerConfig, MonitorConfig, PredictorConfig, ResourceConstraints};
use cardguard::engine::{BatchItem, BatchRequest, CancelToken, Strategy, StrategySelector};
use cardguard::error::CgError;
use cardguard::monitor::{ConstraintLevel, ResourceMonitor, ResourceProbe, classify};
use cardguard::predict::PerformancePredictor;
use cardguard::skill::{Skill, SkillRegistry, Span};

/// Probe with a fixed reading, for driving the classifier deterministically.
struct FixedProbe {
    cpu: f64,
    memory: f64,
}

impl ResourceProbe for FixedProbe {
    fn sample(&self) -> cardguard::Result<(f64, f64, f64)> {
        Ok((self.cpu, self.memory, 4096.0))
    }
}

fn selector_with_probe(
    cpu: f64,
    memory: f64,
    constraints: ResourceConstraints,
) -> (StrategySelector, Arc<SkillRegistry>) {
    let registry = Arc::new(SkillRegistry::new());
    registry
        .register(Skill::pattern("base", r"(?:\d[ -]?){12,18}\d", true))
        .unwrap();
    let monitor = Arc::new(ResourceMonitor::new(
        Arc::new(FixedProbe { cpu, memory }),
        &MonitorConfig::default(),
    ));
    monitor.sample_once();
    let selector = StrategySelector::new(
        Arc::clone(&registry),
        monitor,
        Arc::new(PerformancePredictor::new(PredictorConfig::default())),
        constraints,
        AnalyzerConfig::default(),
    );
    (selector, registry)
}

fn labeled_items(n: usize) -> Vec<BatchItem> {
    (0..n)
        .map(|i| {
            let text = format!("row {i} charged 4111111111111111 ok");
            let start = text.find("4111").unwrap();
            BatchItem {
                expected: Some(vec![Span::new(start, start + 16)]),
                text,
            }
        })
        .collect()
}

#[test]
fn cpu_over_ceiling_classifies_critical() {
    // Ceiling 80, reading 85: over budget in the dominant dimension
    let (selector, _registry) = selector_with_probe(85.0, 10.0, ResourceConstraints::default());
    let (snapshot, level) = selector.resource_state();
    assert!(snapshot.is_some());
    assert_eq!(level, ConstraintLevel::Critical);
}

#[test]
fn thousand_items_sampled_under_critical_load() {
    let constraints = ResourceConstraints {
        max_batch_size: 2000,
        ..ResourceConstraints::default()
    };
    let (selector, _registry) = selector_with_probe(99.0, 10.0, constraints);

    let request = BatchRequest {
        items: labeled_items(1000),
        strategy: Some(Strategy::AdaptiveSampling),
    };
    let outcome = selector.process(&request, &CancelToken::new()).unwrap();

    assert_eq!(outcome.level, ConstraintLevel::Critical);
    assert_eq!(outcome.items_total, 1000);
    // Critical load samples one item in ten
    assert_eq!(outcome.items_processed, 100);
    // Every item holds one card, so the extrapolation lands on the truth
    assert_eq!(outcome.estimated_total_detections, Some(1000));
}

#[test]
fn sparse_history_recommendation_is_low_confidence_heuristic() {
    let (selector, _registry) = selector_with_probe(99.0, 10.0, ResourceConstraints::default());
    let request = BatchRequest {
        items: labeled_items(10),
        strategy: None,
    };
    let outcome = selector.process(&request, &CancelToken::new()).unwrap();

    assert!(outcome.recommendation.heuristic);
    assert!(outcome.recommendation.confidence < 0.5);
    // Critical level maps to sequential in the fallback table
    assert_eq!(outcome.strategy, Strategy::Sequential);
}

#[test]
fn trained_history_never_recommends_parallel_over_cpu_ceiling() {
    // Ceiling 80, reading 85: critical. Build a well-fitted parallel model
    // anyway by forcing the strategy past the recommendation.
    let (selector, _registry) = selector_with_probe(85.0, 10.0, ResourceConstraints::default());
    for n in 1..=25 {
        let request = BatchRequest {
            items: labeled_items(n),
            strategy: Some(Strategy::ParallelLimited),
        };
        selector.process(&request, &CancelToken::new()).unwrap();
    }

    let request = BatchRequest {
        items: labeled_items(10),
        strategy: None,
    };
    let outcome = selector.process(&request, &CancelToken::new()).unwrap();

    assert_eq!(outcome.level, ConstraintLevel::Critical);
    // The trained model is not permitted at this level, so the selector
    // degrades to the heuristic table instead of recommending the pool
    assert_ne!(outcome.recommendation.strategy, Strategy::ParallelLimited);
    assert!(outcome.recommendation.heuristic);
    assert_eq!(outcome.strategy, Strategy::Sequential);
}

#[test]
fn repeated_feedback_doubles_counters() {
    let (selector, registry) = selector_with_probe(10.0, 10.0, ResourceConstraints::default());
    let request = BatchRequest {
        items: labeled_items(5),
        strategy: Some(Strategy::Sequential),
    };

    selector.process(&request, &CancelToken::new()).unwrap();
    let after_one = registry.get("base").unwrap().record.true_positives;
    selector.process(&request, &CancelToken::new()).unwrap();
    let after_two = registry.get("base").unwrap().record.true_positives;

    assert_eq!(after_one, 5);
    assert_eq!(after_two, 2 * after_one);
}

#[test]
fn skill_priority_runs_best_f1_first_without_losing_items() {
    let (selector, _registry) = selector_with_probe(10.0, 10.0, ResourceConstraints::default());
    let request = BatchRequest {
        items: labeled_items(30),
        strategy: Some(Strategy::SkillPriority),
    };
    let outcome = selector.process(&request, &CancelToken::new()).unwrap();
    assert_eq!(outcome.items_processed, 30);
    assert_eq!(outcome.total_detections, 30);
}

#[test]
fn cancelled_batch_reports_cancelled() {
    let (selector, registry) = selector_with_probe(10.0, 10.0, ResourceConstraints::default());
    let cancel = CancelToken::new();
    cancel.cancel();
    let request = BatchRequest {
        items: labeled_items(100),
        strategy: Some(Strategy::ParallelLimited),
    };
    let err = selector.process(&request, &cancel).unwrap_err();
    assert!(matches!(err, CgError::Cancelled));
    // Partial results never reach the counters
    assert_eq!(registry.get("base").unwrap().record.true_positives, 0);
}

#[test]
fn classify_agrees_with_monitor_snapshot() {
    let (selector, _registry) = selector_with_probe(62.0, 10.0, ResourceConstraints::default());
    let (snapshot, level) = selector.resource_state();
    let snapshot = snapshot.unwrap();
    assert_eq!(level, classify(&snapshot, &selector.constraints()));
}
