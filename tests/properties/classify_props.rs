//! Properties of the constraint classifier: determinism and monotonicity.

use chrono::Utc;
use proptest::prelude::*;

use cardguard::config::ResourceConstraints;
use cardguard::monitor::{ResourceSnapshot, classify};

fn snapshot(cpu: f64, memory: f64, workers: usize) -> ResourceSnapshot {
    ResourceSnapshot {
        cpu_percent: cpu,
        memory_percent: memory,
        available_memory_mb: 1024.0,
        active_workers: workers,
        timestamp: Utc::now(),
        stale: false,
    }
}

fn arb_constraints() -> impl Strategy<Value = ResourceConstraints> {
    (1.0f64..=100.0, 1.0f64..=100.0, 1usize..=1000, 1usize..=64).prop_map(
        |(cpu, memory, batch, tasks)| ResourceConstraints {
            max_cpu_percent: cpu,
            max_memory_percent: memory,
            max_batch_size: batch,
            max_concurrent_tasks: tasks,
        },
    )
}

proptest! {
    #[test]
    fn classify_is_deterministic(
        cpu in 0.0f64..=100.0,
        memory in 0.0f64..=100.0,
        workers in 0usize..=64,
        constraints in arb_constraints(),
    ) {
        let s = snapshot(cpu, memory, workers);
        prop_assert_eq!(classify(&s, &constraints), classify(&s, &constraints));
    }

    #[test]
    fn classify_is_monotonic_in_cpu(
        cpu in 0.0f64..=99.0,
        bump in 0.0f64..=50.0,
        memory in 0.0f64..=100.0,
        workers in 0usize..=64,
        constraints in arb_constraints(),
    ) {
        let low = classify(&snapshot(cpu, memory, workers), &constraints);
        let high = classify(&snapshot(cpu + bump, memory, workers), &constraints);
        prop_assert!(high >= low);
    }

    #[test]
    fn classify_is_monotonic_in_memory(
        cpu in 0.0f64..=100.0,
        memory in 0.0f64..=99.0,
        bump in 0.0f64..=50.0,
        workers in 0usize..=64,
        constraints in arb_constraints(),
    ) {
        let low = classify(&snapshot(cpu, memory, workers), &constraints);
        let high = classify(&snapshot(cpu, memory + bump, workers), &constraints);
        prop_assert!(high >= low);
    }

    #[test]
    fn classify_is_monotonic_in_workers(
        cpu in 0.0f64..=100.0,
        memory in 0.0f64..=100.0,
        workers in 0usize..=32,
        extra in 0usize..=32,
        constraints in arb_constraints(),
    ) {
        let low = classify(&snapshot(cpu, memory, workers), &constraints);
        let high = classify(&snapshot(cpu, memory, workers + extra), &constraints);
        prop_assert!(high >= low);
    }
}
