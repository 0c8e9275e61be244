//! Verdict acceptance tests for fixed stamps.
//!
//! The clock is pinned, so each scenario's ages are exact.

use super::common::{ts, Fixture, MODES};
use sampler_common::config::DeliveryMode;
use sampler_common::error::SamplerError;
use sampler_common::state::HarnessState;
use sampler_common::time::Timestamp;
use sampler_runtime::report::{RunOutcome, SamplerReport};

fn run_pair(fixture: &Fixture, primary: Timestamp, depth: Timestamp) -> SamplerReport {
    let player = fixture.play_paired(primary, depth);
    let report = fixture.run();
    player.join().unwrap();
    report
}

#[test]
fn test_aligned_and_fresh_passes() {
    for mode in MODES {
        let fixture = Fixture::new(mode).at(ts(100, 50));
        let report = run_pair(&fixture, ts(100, 0), ts(100, 0));

        assert!(report.passed(), "{mode:?}: {:?}", report.failures);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.final_state, HarnessState::TornDown);
        assert_eq!(report.aligned, Some(true));
        let age = report.primary.age_secs.unwrap();
        assert!((age - 0.05).abs() < 1e-9, "age {age}");
        assert!(report.into_result().is_ok());
    }
}

#[test]
fn test_depth_skew_fails_alignment() {
    let fixture = Fixture::new(DeliveryMode::Queued).at(ts(100, 50));
    let report = run_pair(&fixture, ts(100, 0), ts(100, 10));

    assert_eq!(report.outcome, RunOutcome::Misaligned);
    assert_eq!(report.aligned, Some(false));
    assert_eq!(
        report.failures,
        vec![SamplerError::Misaligned {
            primary: ts(100, 0),
            depth: ts(100, 10),
        }]
    );
    // Both stamps are still fresh
    assert_eq!(report.primary.fresh, Some(true));
    assert_eq!(report.depth.fresh, Some(true));
}

#[test]
fn test_old_stamps_fail_freshness() {
    let fixture = Fixture::new(DeliveryMode::Queued).at(ts(100, 0));
    let report = run_pair(&fixture, ts(90, 0), ts(90, 0));

    assert_eq!(report.outcome, RunOutcome::Stale);
    assert_eq!(report.aligned, Some(true));
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f, SamplerError::Stale { .. })));
    assert_eq!(report.primary.fresh, Some(false));
    assert!((report.depth.age_secs.unwrap() - 10.0).abs() < 1e-9);
}

#[test]
fn test_age_equal_to_bound_is_stale() {
    let fixture = Fixture::new(DeliveryMode::Queued).at(ts(100, 500));
    let report = run_pair(&fixture, ts(100, 0), ts(100, 0));

    assert_eq!(report.outcome, RunOutcome::Stale);
}

#[test]
fn test_misaligned_and_stale_reports_every_failure() {
    let fixture = Fixture::new(DeliveryMode::Queued).at(ts(100, 0));
    let report = run_pair(&fixture, ts(90, 0), ts(91, 0));

    assert_eq!(report.outcome, RunOutcome::Misaligned);
    assert_eq!(report.failures.len(), 3);
    assert!(matches!(report.failures[0], SamplerError::Misaligned { .. }));
    assert!(report.failures[1..].iter().all(SamplerError::is_assertion_failure));
}

#[test]
fn test_report_serializes_for_tooling() {
    let fixture = Fixture::new(DeliveryMode::Queued).at(ts(100, 50));
    let report = run_pair(&fixture, ts(100, 0), ts(100, 10));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"], "misaligned");
    assert_eq!(json["final_state"], "TORN_DOWN");
    assert_eq!(json["aligned"], false);
    assert!(json["failures"][0].as_str().unwrap().contains("100.010000000"));
}
