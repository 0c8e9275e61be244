//! Per-channel sample cell.
//!
//! A [`Sample`] holds the most recent timestamp delivered on one channel and
//! whether anything has arrived yet. The channel's callback is the only writer;
//! the harness polls [`Sample::has_arrived`] and reads the stamp once both
//! channels have delivered.
//!
//! # Threading Model
//!
//! - **Delivery thread** (transport or harness): calls [`Sample::record`]
//! - **Harness thread**: polls [`Sample::has_arrived`], then calls [`Sample::freeze`]
//!
//! The arrival flag is a lone atomic so polling never takes the lock. Once
//! frozen, the stamp no longer changes; later deliveries only bump the counter.

use sampler_common::time::Timestamp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

#[derive(Debug, Default)]
struct SampleInner {
    stamp: Option<Timestamp>,
    deliveries: u64,
    frozen: bool,
}

/// Latest-timestamp cell for one channel.
#[derive(Debug)]
pub struct Sample {
    channel: String,
    arrived: AtomicBool,
    inner: Mutex<SampleInner>,
}

impl Sample {
    /// Create an empty sample for `channel`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            arrived: AtomicBool::new(false),
            inner: Mutex::new(SampleInner::default()),
        }
    }

    /// Channel this sample belongs to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn lock(&self) -> MutexGuard<'_, SampleInner> {
        // The critical sections never panic midway, so a poisoned guard still
        // holds consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a delivered timestamp.
    ///
    /// Returns false if the sample is frozen and the stamp was ignored.
    pub fn record(&self, stamp: Timestamp) -> bool {
        let mut inner = self.lock();
        inner.deliveries += 1;
        if inner.frozen {
            trace!(channel = %self.channel, %stamp, "Ignoring delivery to frozen sample");
            return false;
        }
        inner.stamp = Some(stamp);
        drop(inner);

        self.arrived.store(true, Ordering::Release);
        trace!(channel = %self.channel, %stamp, "Sample recorded");
        true
    }

    /// Check whether at least one message has arrived.
    #[inline]
    pub fn has_arrived(&self) -> bool {
        self.arrived.load(Ordering::Acquire)
    }

    /// Stop accepting new stamps and return the recorded one.
    ///
    /// Returns `None` if nothing has arrived; the sample stays open in that case.
    pub fn freeze(&self) -> Option<Timestamp> {
        let mut inner = self.lock();
        let stamp = inner.stamp?;
        inner.frozen = true;
        Some(stamp)
    }

    /// Check whether the sample has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.lock().frozen
    }

    /// Latest recorded stamp, if any.
    pub fn latest(&self) -> Option<Timestamp> {
        self.lock().stamp
    }

    /// Total number of deliveries, including those ignored after freezing.
    pub fn deliveries(&self) -> u64 {
        self.lock().deliveries
    }
}
