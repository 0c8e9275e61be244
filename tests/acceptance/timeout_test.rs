//! Bounded wait acceptance tests.
//!
//! A stream that never delivers must end the run as timed out, close to the
//! configured deadline, naming the silent channel.

use super::common::{fast_config, ts, Fixture, Step, Stream, POLL};
use sampler_common::config::{DeliveryMode, SamplerConfig};
use sampler_common::error::SamplerError;
use sampler_common::state::HarnessState;
use sampler_runtime::report::RunOutcome;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(200);

fn short_deadline() -> Fixture {
    let config = SamplerConfig {
        timeout: TIMEOUT,
        ..fast_config()
    };
    Fixture::with_config(DeliveryMode::Queued, config)
}

#[test]
fn test_silent_depth_times_out() {
    let fixture = short_deadline();
    let report = fixture.run_with(vec![Step::new(Stream::Primary, ts(100, 0))]);

    assert_eq!(report.outcome, RunOutcome::TimedOut);
    assert_eq!(report.final_state, HarnessState::TornDown);
    assert_eq!(report.exit_code(), 1);
    assert!(report.waited >= TIMEOUT);
    // Generous slack for scheduler noise on loaded CI machines
    assert!(report.waited < TIMEOUT + POLL + Duration::from_millis(500));

    match report.failures.as_slice() {
        [SamplerError::Timeout { missing, .. }] => {
            assert_eq!(missing, &vec![fixture.config.channels.depth.clone()]);
        }
        other => panic!("expected a single timeout, got {other:?}"),
    }
    assert_eq!(report.aligned, None);
    assert_eq!(report.primary.stamp, None);
    assert_eq!(report.primary.deliveries, 1);
}

#[test]
fn test_both_silent_names_both_channels() {
    let fixture = short_deadline();
    let report = fixture.run();

    assert_eq!(report.outcome, RunOutcome::TimedOut);
    match report.failures.as_slice() {
        [SamplerError::Timeout { missing, .. }] => {
            assert_eq!(missing.len(), 2);
            assert!(missing.contains(&fixture.config.channels.primary));
            assert!(missing.contains(&fixture.config.channels.depth));
        }
        other => panic!("expected a single timeout, got {other:?}"),
    }
}

#[test]
fn test_poll_interval_longer_than_timeout() {
    let config = SamplerConfig {
        poll_interval: Duration::from_secs(10),
        timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let fixture = Fixture::with_config(DeliveryMode::Queued, config);
    let report = fixture.run();

    assert_eq!(report.outcome, RunOutcome::TimedOut);
    // The last sleep is clipped to the deadline
    assert!(report.waited < Duration::from_secs(1));
}
