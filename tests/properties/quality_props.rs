//! Properties of the performance record: derived scores stay in range and
//! are never NaN, whatever the counters hold.

use proptest::prelude::*;

use cardguard::skill::{PerformanceRecord, QualityGrade};

proptest! {
    #[test]
    fn scores_stay_in_unit_interval(tp in 0u64..10_000, fp in 0u64..10_000, fn_ in 0u64..10_000) {
        let mut record = PerformanceRecord::default();
        record.record(tp, fp, fn_);

        for score in [record.precision(), record.recall(), record.f1()] {
            if let Some(value) = score {
                prop_assert!(!value.is_nan());
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn f1_defined_exactly_when_gradeable(tp in 0u64..100, fp in 0u64..100, fn_ in 0u64..100) {
        let mut record = PerformanceRecord::default();
        record.record(tp, fp, fn_);
        prop_assert_eq!(record.f1().is_some(), record.grade().is_some());
    }

    #[test]
    fn grade_matches_f1_bucket(tp in 1u64..100, fp in 0u64..100, fn_ in 0u64..100) {
        let mut record = PerformanceRecord::default();
        record.record(tp, fp, fn_);
        let f1 = record.f1().unwrap();
        prop_assert_eq!(record.grade().unwrap(), QualityGrade::from_f1(f1));
    }

    #[test]
    fn recording_more_hits_never_lowers_recall(
        tp in 1u64..100, fp in 0u64..100, fn_ in 0u64..100, extra in 0u64..100,
    ) {
        let mut record = PerformanceRecord::default();
        record.record(tp, fp, fn_);
        let before = record.recall().unwrap();
        record.record(extra, 0, 0);
        let after = record.recall().unwrap();
        prop_assert!(after >= before);
    }
}
