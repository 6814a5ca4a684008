//! The adaptive loop end to end: a missed format becomes a gap, a
//! generated skill, and finally a live detector that closes the gap.

use cardguard::app::{AppContext, BASE_SKILL};
use cardguard::config::Config;
use cardguard::engine::{BatchItem, BatchRequest, CancelToken, Strategy};
use cardguard::error::CgError;
use cardguard::gaps::LabeledExample;
use cardguard::skill::{Skill, Span};

fn dotted_corpus(n: usize) -> Vec<LabeledExample> {
    (0..n)
        .map(|i| {
            let text = format!("ref {i}: 4111.1111.1111.1111 charged");
            let start = text.find("4111").unwrap();
            LabeledExample {
                expected: vec![Span::new(start, start + 19)],
                text,
            }
        })
        .collect()
}

#[test]
fn gap_analysis_closes_a_detection_gap() {
    let app = AppContext::init(Config::default()).unwrap();
    let corpus = dotted_corpus(4);

    // The built-in skill cannot see dot-separated numbers
    let before = app
        .process(
            &BatchRequest {
                items: corpus
                    .iter()
                    .map(|ex| BatchItem::unlabeled(ex.text.clone()))
                    .collect(),
                strategy: Some(Strategy::Sequential),
            },
            &CancelToken::new(),
        )
        .unwrap();
    assert_eq!(before.total_detections, 0);

    let outcome = app.run_gap_analysis(&corpus).unwrap();
    assert_eq!(outcome.registered.len(), 1);
    assert!(outcome.blocked.is_empty());
    assert!(outcome.rejected.is_empty());

    // The generated skill now detects what the base skill missed
    let after = app
        .process(
            &BatchRequest {
                items: corpus
                    .iter()
                    .map(|ex| BatchItem::unlabeled(ex.text.clone()))
                    .collect(),
                strategy: Some(Strategy::Sequential),
            },
            &CancelToken::new(),
        )
        .unwrap();
    assert_eq!(after.total_detections, 4);

    // And the gap no longer exists
    let second = app.run_gap_analysis(&corpus).unwrap();
    assert!(second.report.gaps.is_empty());
    assert_eq!(second.report.coverage(), Some(1.0));
    app.shutdown();
}

#[test]
fn generated_skills_show_up_in_listings() {
    let app = AppContext::init(Config::default()).unwrap();
    let outcome = app.run_gap_analysis(&dotted_corpus(3)).unwrap();
    let name = &outcome.registered[0];

    let rows = app.list_skills(None);
    assert!(rows.iter().any(|r| &r.name == name && r.active));
    assert!(rows.iter().any(|r| r.name == BASE_SKILL));
    app.shutdown();
}

#[test]
fn duplicate_registration_is_rejected() {
    let app = AppContext::init(Config::default()).unwrap();
    let err = app
        .registry()
        .register(Skill::pattern(BASE_SKILL, r"\d{16}", false))
        .unwrap_err();
    assert!(matches!(err, CgError::DuplicateSkillName(_)));
    app.shutdown();
}

#[test]
fn feedback_flows_into_quality_listing() {
    let app = AppContext::init(Config::default()).unwrap();
    app.submit_feedback(BASE_SKILL, 9, 1, 1).unwrap();

    let rows = app.list_skills(Some(0.5));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, BASE_SKILL);
    assert!(rows[0].f1.unwrap() > 0.8);
    app.shutdown();
}
