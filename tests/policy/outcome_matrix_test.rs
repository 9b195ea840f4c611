//! Exhaustive outcome-pair coverage for the failure-or-recovery classifier.

use std::sync::Arc;

use embercast::build::{BuildRecord, Outcome};
use embercast::config::{GlobalConfig, NotifierConfig};
use embercast::policy::{is_failure_or_recovery, should_notify};

const ALL_OUTCOMES: [Outcome; 5] = [
    Outcome::Success,
    Outcome::Failure,
    Outcome::Unstable,
    Outcome::Aborted,
    Outcome::NotBuilt,
];

fn build_pair(previous: Outcome, current: Outcome) -> BuildRecord {
    let prev = Arc::new(BuildRecord::new("matrix", 1, previous));
    BuildRecord::new("matrix", 2, current)
        .with_previous(prev)
        .expect("valid link")
}

/// Expected classification: failures and instabilities always qualify;
/// success qualifies only after a non-success; everything else never does.
fn expected(previous: Option<Outcome>, current: Outcome) -> bool {
    match current {
        Outcome::Failure | Outcome::Unstable => true,
        Outcome::Success => previous.is_some_and(|p| p != Outcome::Success),
        Outcome::Aborted | Outcome::NotBuilt => false,
    }
}

#[test]
fn every_outcome_pair_classifies_as_specified() {
    for previous in ALL_OUTCOMES {
        for current in ALL_OUTCOMES {
            let build = build_pair(previous, current);
            assert_eq!(
                is_failure_or_recovery(&build),
                expected(Some(previous), current),
                "previous={previous:?} current={current:?}"
            );
        }
    }
}

#[test]
fn first_build_of_a_project_classifies_without_history() {
    for current in ALL_OUTCOMES {
        let build = BuildRecord::new("matrix", 1, current);
        assert_eq!(
            is_failure_or_recovery(&build),
            expected(None, current),
            "current={current:?}"
        );
    }
}

#[test]
fn unset_flag_with_global_false_always_notifies() {
    let project = NotifierConfig::default();
    let global = GlobalConfig::default();
    assert!(!global.only_on_failure_or_recovery);

    for previous in ALL_OUTCOMES {
        for current in ALL_OUTCOMES {
            let build = build_pair(previous, current);
            assert!(should_notify(&build, &project, &global));
        }
    }
}

#[test]
fn filtering_follows_the_classifier_when_enabled() {
    let project = NotifierConfig {
        only_on_failure_or_recovery: Some(true),
        ..NotifierConfig::default()
    };
    let global = GlobalConfig::default();

    for previous in ALL_OUTCOMES {
        for current in ALL_OUTCOMES {
            let build = build_pair(previous, current);
            assert_eq!(
                should_notify(&build, &project, &global),
                is_failure_or_recovery(&build)
            );
        }
    }
}
