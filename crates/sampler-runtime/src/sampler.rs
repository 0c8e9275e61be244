//! Dual-stream sampler.
//!
//! Subscribes to a primary and a depth channel, waits until both have
//! delivered, then checks that the two stamps are identical and recent:
//!
//! 1. Subscribe both channels (each callback owns one [`Sample`])
//! 2. Poll until both samples have arrived or the deadline passes
//! 3. Freeze both samples and read their stamps once
//! 4. Check alignment and the freshness of each stamp
//! 5. Release both subscriptions, whatever happened above
//!
//! All three checks are evaluated even when an earlier one fails, so a report
//! lists every failing comparison.

use crate::clock::Clock;
use crate::report::{RunOutcome, SampleReading, SamplerReport};
use crate::sample::Sample;
use crate::transport::{Frame, FrameCallback, Subscription, Transport};
use sampler_common::config::SamplerConfig;
use sampler_common::error::{SamplerError, SamplerResult};
use sampler_common::state::{HarnessState, StateMachine};
use sampler_common::time::Timestamp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Subscribe `sample` to every frame published on `channel`.
///
/// # Errors
///
/// Propagates [`SamplerError::ChannelUnavailable`] from the transport.
pub fn subscribe<T: Transport + ?Sized>(
    transport: &T,
    channel: &str,
    queue_size: usize,
    sample: Arc<Sample>,
) -> SamplerResult<Subscription> {
    let callback: FrameCallback = Arc::new(move |frame: &Frame| {
        sample.record(frame.stamp);
    });
    transport.subscribe(channel, queue_size, callback)
}

/// Block until both samples have arrived, then freeze them and return their stamps.
///
/// Each iteration lets the transport run pending callbacks, checks both arrival
/// flags, and sleeps for `poll_interval` (never past the deadline). A `timeout`
/// too large to add to the current instant means no deadline.
///
/// # Errors
///
/// Returns [`SamplerError::Timeout`] naming the missing channels if `timeout`
/// elapses first.
pub fn wait_for_both<T: Transport + ?Sized>(
    transport: &T,
    a: &Sample,
    b: &Sample,
    poll_interval: Duration,
    timeout: Duration,
) -> SamplerResult<(Timestamp, Timestamp)> {
    let started = Instant::now();
    let deadline = started.checked_add(timeout);
    let mut polls = 0u64;

    loop {
        transport.spin_once();
        polls += 1;

        if let Some(pair) = freeze_pair(a, b) {
            debug!(
                polls,
                waited_ms = started.elapsed().as_millis(),
                "Both samples arrived"
            );
            return Ok(pair);
        }

        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            let missing: Vec<String> = [a, b]
                .iter()
                .filter(|s| !s.has_arrived())
                .map(|s| s.channel().to_string())
                .collect();
            warn!(polls, ?missing, "Timed out waiting for samples");
            return Err(SamplerError::Timeout {
                waited: started.elapsed(),
                missing,
            });
        }

        thread::sleep(deadline.map_or(poll_interval, |d| poll_interval.min(d - now)));
    }
}

fn freeze_pair(a: &Sample, b: &Sample) -> Option<(Timestamp, Timestamp)> {
    if !(a.has_arrived() && b.has_arrived()) {
        return None;
    }
    // An arrived sample always holds a stamp.
    Some((a.freeze()?, b.freeze()?))
}

/// Check that two stamps are identical.
#[must_use]
pub fn check_alignment(a: Timestamp, b: Timestamp) -> bool {
    a == b
}

/// Check that `stamp` is strictly younger than `max_age` at `now`.
///
/// Stamps later than `now` have a negative age and count as fresh.
#[must_use]
pub fn check_freshness(stamp: Timestamp, now: Timestamp, max_age: Duration) -> bool {
    let max_age_ns = i128::try_from(max_age.as_nanos()).unwrap_or(i128::MAX);
    now.nanos_since(stamp) < max_age_ns
}

/// Run one complete sampling check against `transport`.
///
/// Never panics on a failed check; the outcome and every failure are in the
/// returned report. Both subscriptions are released before this returns.
pub fn run_sampler_test<T: Transport + ?Sized>(
    transport: &T,
    clock: &dyn Clock,
    config: &SamplerConfig,
) -> SamplerReport {
    let primary = Arc::new(Sample::new(config.channels.primary.as_str()));
    let depth = Arc::new(Sample::new(config.channels.depth.as_str()));

    if let Err(e) = config.validate() {
        error!(error = %e, "Refusing to run with invalid configuration");
        return SamplerReport {
            outcome: RunOutcome::InvalidConfig,
            final_state: HarnessState::Idle,
            primary: reading(&primary, None, None),
            depth: reading(&depth, None, None),
            aligned: None,
            waited: Duration::ZERO,
            failures: vec![e],
        };
    }

    info!(
        primary = %config.channels.primary,
        depth = %config.channels.depth,
        poll_interval_ms = config.poll_interval.as_millis(),
        max_age_ms = config.max_age.as_millis(),
        timeout_ms = config.timeout.as_millis(),
        "Starting dual-stream sampler"
    );

    let mut sm = StateMachine::new();
    let mut subs: Vec<Subscription> = Vec::with_capacity(2);
    let mut released: Vec<Arc<AtomicBool>> = Vec::with_capacity(2);

    for sample in [&primary, &depth] {
        match subscribe(
            transport,
            sample.channel(),
            config.channels.queue_size,
            Arc::clone(sample),
        ) {
            Ok(sub) => {
                released.push(sub.release_flag());
                subs.push(sub);
            }
            Err(e) => {
                error!(channel = sample.channel(), error = %e, "Subscription failed");
                release_all(&mut subs);
                advance(&mut sm, HarnessState::TornDown);
                return SamplerReport {
                    outcome: RunOutcome::ChannelUnavailable,
                    final_state: sm.state(),
                    primary: reading(&primary, released.first(), None),
                    depth: reading(&depth, released.get(1), None),
                    aligned: None,
                    waited: Duration::ZERO,
                    failures: vec![e],
                };
            }
        }
    }
    advance(&mut sm, HarnessState::Subscribed);
    advance(&mut sm, HarnessState::Waiting);

    let started = Instant::now();
    let waited_result = wait_for_both(
        transport,
        &primary,
        &depth,
        config.poll_interval,
        config.timeout,
    );
    let waited = started.elapsed();

    let mut failures = Vec::new();
    let mut aligned = None;
    let mut now = None;

    let outcome = match waited_result {
        Ok((primary_stamp, depth_stamp)) => {
            let is_aligned = check_alignment(primary_stamp, depth_stamp);
            info!(
                primary = %primary_stamp,
                depth = %depth_stamp,
                aligned = is_aligned,
                "Alignment check"
            );
            if !is_aligned {
                failures.push(SamplerError::Misaligned {
                    primary: primary_stamp,
                    depth: depth_stamp,
                });
            }
            aligned = Some(is_aligned);

            let reading_now = clock.now();
            now = Some(reading_now);
            let mut stale = false;
            for (sample, stamp) in [(&primary, primary_stamp), (&depth, depth_stamp)] {
                let fresh = check_freshness(stamp, reading_now, config.max_age);
                info!(
                    channel = sample.channel(),
                    %stamp,
                    now = %reading_now,
                    age_secs = stamp.age_secs_at(reading_now),
                    fresh,
                    "Freshness check"
                );
                if !fresh {
                    stale = true;
                    failures.push(SamplerError::Stale {
                        channel: sample.channel().to_string(),
                        stamp,
                        now: reading_now,
                        max_age: config.max_age,
                    });
                }
            }

            if !is_aligned {
                RunOutcome::Misaligned
            } else if stale {
                RunOutcome::Stale
            } else {
                RunOutcome::Passed
            }
        }
        Err(e) => {
            failures.push(e);
            RunOutcome::TimedOut
        }
    };
    if let Some(verdict) = outcome.verdict() {
        advance(&mut sm, verdict);
    }

    release_all(&mut subs);
    advance(&mut sm, HarnessState::TornDown);

    let report = SamplerReport {
        outcome,
        final_state: sm.state(),
        primary: reading(&primary, released.first(), now.map(|n| (n, config.max_age))),
        depth: reading(&depth, released.get(1), now.map(|n| (n, config.max_age))),
        aligned,
        waited,
        failures,
    };

    if report.passed() {
        info!(waited_ms = waited.as_millis(), "Sampler check passed");
    } else {
        for failure in &report.failures {
            error!(error = %failure, "Sampler check failed");
        }
    }
    report
}

/// Apply a transition whose validity follows from the run sequence.
fn advance(sm: &mut StateMachine, target: HarnessState) {
    if let Err(e) = sm.transition(target) {
        warn!("Unexpected harness transition: {}", e);
    }
}

fn release_all(subs: &mut Vec<Subscription>) {
    for mut sub in subs.drain(..) {
        sub.shutdown();
    }
}

fn reading(
    sample: &Sample,
    released: Option<&Arc<AtomicBool>>,
    freshness: Option<(Timestamp, Duration)>,
) -> SampleReading {
    let stamp = if sample.is_frozen() {
        sample.latest()
    } else {
        None
    };
    let (age_secs, fresh) = match (stamp, freshness) {
        (Some(stamp), Some((now, max_age))) => (
            Some(stamp.age_secs_at(now)),
            Some(check_freshness(stamp, now, max_age)),
        ),
        _ => (None, None),
    };

    SampleReading {
        channel: sample.channel().to_string(),
        stamp,
        age_secs,
        fresh,
        deliveries: sample.deliveries(),
        // No subscription means nothing left to release.
        released: released.map_or(true, |flag| flag.load(Ordering::Acquire)),
    }
}
