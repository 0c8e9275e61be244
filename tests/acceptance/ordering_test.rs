//! Arrival order acceptance tests.
//!
//! The verdict must not depend on which stream delivers first, or on
//! whether callbacks run on the publishing thread or on the harness thread.

use super::common::{ts, Fixture, Step, Stream, MODES};
use sampler_runtime::report::RunOutcome;
use std::time::Duration;

#[test]
fn test_primary_first() {
    for mode in MODES {
        let fixture = Fixture::new(mode);
        let report = fixture.run_with(vec![
            Step::new(Stream::Primary, ts(100, 0)),
            Step::new(Stream::Depth, ts(100, 0)).after(Duration::from_millis(30)),
        ]);
        assert_eq!(report.outcome, RunOutcome::Passed, "{mode:?}: {:?}", report.failures);
    }
}

#[test]
fn test_depth_first() {
    for mode in MODES {
        let fixture = Fixture::new(mode);
        let report = fixture.run_with(vec![
            Step::new(Stream::Depth, ts(100, 0)),
            Step::new(Stream::Primary, ts(100, 0)).after(Duration::from_millis(30)),
        ]);
        assert_eq!(report.outcome, RunOutcome::Passed, "{mode:?}: {:?}", report.failures);
    }
}

#[test]
fn test_simultaneous_arrival() {
    for mode in MODES {
        let fixture = Fixture::new(mode);
        let player = fixture.play_paired(ts(100, 0), ts(100, 0));
        let report = fixture.run();
        player.join().unwrap();

        assert!(report.passed(), "{mode:?}: {:?}", report.failures);
        assert_eq!(report.primary.deliveries, 1);
        assert_eq!(report.depth.deliveries, 1);
    }
}

#[test]
fn test_early_stream_keeps_latest_stamp() {
    for mode in MODES {
        let fixture = Fixture::new(mode);
        let report = fixture.run_with(vec![
            Step::new(Stream::Primary, ts(99, 0)),
            Step::new(Stream::Primary, ts(100, 0)).after(Duration::from_millis(10)),
            Step::new(Stream::Depth, ts(100, 0)).after(Duration::from_millis(30)),
        ]);

        assert!(report.passed(), "{mode:?}: {:?}", report.failures);
        assert_eq!(report.primary.stamp, Some(ts(100, 0)));
    }
}

#[test]
fn test_arrival_after_several_polls() {
    let fixture = Fixture::new(Default::default());
    let report = fixture.run_with(vec![
        Step::new(Stream::Primary, ts(100, 0)).after(Duration::from_millis(40)),
        Step::new(Stream::Depth, ts(100, 0)).after(Duration::from_millis(40)),
    ]);

    assert!(report.passed(), "{:?}", report.failures);
    assert!(report.waited >= Duration::from_millis(80));
}
