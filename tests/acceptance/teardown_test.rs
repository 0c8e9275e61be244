//! Teardown acceptance tests.
//!
//! Every exit path must leave no subscription behind on the transport.

use super::common::{fast_config, ts, Fixture, Step, Stream, MODES};
use sampler_common::config::{DeliveryMode, SamplerConfig};
use sampler_common::state::HarnessState;
use sampler_runtime::report::{RunOutcome, SamplerReport};
use sampler_runtime::transport::{Frame, Transport};
use std::time::Duration;

fn assert_released(fixture: &Fixture, report: &SamplerReport) {
    assert!(report.primary.released, "primary still subscribed");
    assert!(report.depth.released, "depth still subscribed");
    assert_eq!(fixture.transport.subscriber_count(&fixture.config.channels.primary), 0);
    assert_eq!(fixture.transport.subscriber_count(&fixture.config.channels.depth), 0);
    assert_eq!(fixture.primary.subscriber_count(), 0);
}

#[test]
fn test_released_after_pass() {
    for mode in MODES {
        let fixture = Fixture::new(mode);
        let player = fixture.play_paired(ts(100, 0), ts(100, 0));
        let report = fixture.run();
        player.join().unwrap();

        assert_eq!(report.outcome, RunOutcome::Passed);
        assert_released(&fixture, &report);
    }
}

#[test]
fn test_released_after_failed_check() {
    let fixture = Fixture::new(DeliveryMode::Queued);
    let player = fixture.play_paired(ts(100, 0), ts(100, 10));
    let report = fixture.run();
    player.join().unwrap();

    assert_eq!(report.outcome, RunOutcome::Misaligned);
    assert_eq!(report.final_state, HarnessState::TornDown);
    assert_released(&fixture, &report);
}

#[test]
fn test_released_after_timeout() {
    let config = SamplerConfig {
        timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let fixture = Fixture::with_config(DeliveryMode::Immediate, config);
    let report = fixture.run_with(vec![Step::new(Stream::Depth, ts(100, 0))]);

    assert_eq!(report.outcome, RunOutcome::TimedOut);
    assert_released(&fixture, &report);
}

#[test]
fn test_no_callbacks_after_teardown() {
    let fixture = Fixture::new(DeliveryMode::Immediate);
    let player = fixture.play_paired(ts(100, 0), ts(100, 0));
    let report = fixture.run();
    player.join().unwrap();
    assert!(report.passed(), "{:?}", report.failures);

    assert_eq!(fixture.primary.publish(&Frame::stamped(ts(101, 0))), 0);
    assert_eq!(fixture.depth.publish(&Frame::stamped(ts(101, 0))), 0);
}

#[test]
fn test_repeated_runs_on_one_transport() {
    let fixture = Fixture::new(DeliveryMode::Queued);
    for _ in 0..3 {
        let player = fixture.play_paired(ts(100, 0), ts(100, 0));
        let report = fixture.run();
        player.join().unwrap();

        assert!(report.passed(), "{:?}", report.failures);
        assert_released(&fixture, &report);
    }
}
