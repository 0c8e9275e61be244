//! Shared fixture for acceptance runs.
//!
//! A [`Fixture`] owns a loopback transport with both default channels
//! advertised and a manual clock, so verdicts depend only on the stamps a
//! test publishes.

#![allow(dead_code)]

use sampler_common::config::{DeliveryMode, SamplerConfig};
use sampler_common::time::Timestamp;
use sampler_runtime::clock::ManualClock;
use sampler_runtime::loopback::{LoopbackTransport, Publisher};
use sampler_runtime::report::SamplerReport;
use sampler_runtime::sampler::run_sampler_test;
use sampler_runtime::transport::Frame;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Poll interval used by acceptance runs.
pub const POLL: Duration = Duration::from_millis(5);

/// Which stream a scripted publication goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Primary,
    Depth,
}

/// One step of a publication script.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    /// Pause before publishing.
    pub delay: Duration,
    pub stream: Stream,
    pub stamp: Timestamp,
}

impl Step {
    pub fn new(stream: Stream, stamp: Timestamp) -> Self {
        Self {
            delay: Duration::ZERO,
            stream,
            stamp,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Config with short polling and a short deadline.
pub fn fast_config() -> SamplerConfig {
    SamplerConfig {
        poll_interval: POLL,
        timeout: Duration::from_secs(2),
        ..SamplerConfig::default()
    }
}

/// Loopback transport, both channel publishers, and a manual clock.
pub struct Fixture {
    pub transport: LoopbackTransport,
    pub primary: Publisher,
    pub depth: Publisher,
    pub clock: ManualClock,
    pub config: SamplerConfig,
}

impl Fixture {
    pub fn new(mode: DeliveryMode) -> Self {
        Self::with_config(mode, fast_config())
    }

    pub fn with_config(mode: DeliveryMode, config: SamplerConfig) -> Self {
        let transport = LoopbackTransport::new(mode);
        let primary = transport.advertise(&config.channels.primary).unwrap();
        let depth = transport.advertise(&config.channels.depth).unwrap();
        Self {
            transport,
            primary,
            depth,
            clock: ManualClock::new(Timestamp::new(100, 50_000_000)),
            config,
        }
    }

    /// Set the time the freshness checks will read.
    pub fn at(self, now: Timestamp) -> Self {
        self.clock.set(now);
        self
    }

    /// Play `script` on a helper thread once both channels have a subscriber.
    pub fn play(&self, script: Vec<Step>) -> JoinHandle<()> {
        let primary = self.primary.clone();
        let depth = self.depth.clone();
        thread::spawn(move || {
            wait_for_subscribers(&primary, &depth);
            for step in script {
                thread::sleep(step.delay);
                let publisher = match step.stream {
                    Stream::Primary => &primary,
                    Stream::Depth => &depth,
                };
                publisher.publish(&Frame::stamped(step.stamp));
            }
        })
    }

    /// Publish one frame on each stream as a single unit once both are subscribed.
    pub fn play_paired(&self, primary_stamp: Timestamp, depth_stamp: Timestamp) -> JoinHandle<()> {
        let primary = self.primary.clone();
        let depth = self.depth.clone();
        thread::spawn(move || {
            wait_for_subscribers(&primary, &depth);
            primary.publish_paired(
                &Frame::stamped(primary_stamp),
                &depth,
                &Frame::stamped(depth_stamp),
            );
        })
    }

    /// Run one sampler check.
    pub fn run(&self) -> SamplerReport {
        run_sampler_test(&self.transport, &self.clock, &self.config)
    }

    /// Run one check while `script` plays, and wait for the script to finish.
    pub fn run_with(&self, script: Vec<Step>) -> SamplerReport {
        let player = self.play(script);
        let report = self.run();
        player.join().unwrap();
        report
    }
}

/// Block until both publishers see a subscriber, or give up after a few seconds.
fn wait_for_subscribers(primary: &Publisher, depth: &Publisher) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while primary.subscriber_count() == 0 || depth.subscriber_count() == 0 {
        if Instant::now() >= deadline {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Both delivery modes, for tests that must hold in each.
pub const MODES: [DeliveryMode; 2] = [DeliveryMode::Immediate, DeliveryMode::Queued];

pub fn ts(sec: u32, msec: u32) -> Timestamp {
    Timestamp::new(sec, msec * 1_000_000)
}
