//! Publish/subscribe transport abstraction.
//!
//! The harness only needs two things from a middleware: register a callback on
//! a named channel, and (for single-threaded transports) a point where pending
//! callbacks may run. [`Transport`] captures exactly that, so the harness works
//! the same against the in-process [`crate::loopback::LoopbackTransport`] or a
//! binding to a real middleware.

use sampler_common::error::{SamplerError, SamplerResult};
use sampler_common::time::Timestamp;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Inbound message.
///
/// Only `stamp` is read by the harness; `frame_id` and `payload` pass through
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Producer timestamp from the message header.
    pub stamp: Timestamp,
    /// Coordinate frame or source identifier.
    pub frame_id: String,
    /// Opaque message body.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame carrying only a timestamp.
    pub fn stamped(stamp: Timestamp) -> Self {
        Self {
            stamp,
            ..Self::default()
        }
    }
}

/// Callback invoked once per inbound frame.
pub type FrameCallback = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Publish/subscribe transport seam.
pub trait Transport: Send + Sync {
    /// Register `callback` for every frame published on `channel`.
    ///
    /// `queue_size` bounds how many undelivered frames the transport keeps for
    /// this subscriber; older frames are dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::ChannelUnavailable`] if the channel cannot be resolved.
    fn subscribe(
        &self,
        channel: &str,
        queue_size: usize,
        callback: FrameCallback,
    ) -> SamplerResult<Subscription>;

    /// Run callbacks for frames waiting to be delivered on this thread.
    ///
    /// Transports that deliver on their own threads leave this as a no-op.
    fn spin_once(&self) {}

    /// Number of live subscriptions on `channel`.
    fn subscriber_count(&self, channel: &str) -> usize;
}

/// Check that a channel name is well formed.
///
/// Names are non-empty and use ASCII alphanumerics, `_`, `/`, and `~`, and do
/// not start with a digit.
///
/// # Errors
///
/// Returns [`SamplerError::ChannelUnavailable`] describing the problem.
pub fn validate_channel_name(channel: &str) -> SamplerResult<()> {
    let unavailable = |reason: &str| SamplerError::ChannelUnavailable {
        channel: channel.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = channel.chars().next() else {
        return Err(unavailable("empty channel name"));
    };
    if first.is_ascii_digit() {
        return Err(unavailable("channel name starts with a digit"));
    }
    if let Some(bad) = channel
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '~')))
    {
        return Err(unavailable(&format!("invalid character {bad:?}")));
    }
    if channel.contains("//") {
        return Err(unavailable("empty path segment"));
    }
    Ok(())
}

/// Live channel subscription.
///
/// Releasing is idempotent. A handle that goes out of scope unreleased is
/// released on drop, so every exit path unsubscribes.
pub struct Subscription {
    channel: String,
    released: Arc<AtomicBool>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a handle whose `release` hook unregisters the callback.
    pub fn new(channel: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            channel: channel.into(),
            released: Arc::new(AtomicBool::new(false)),
            release: Some(Box::new(release)),
        }
    }

    /// Channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Unsubscribe from the channel.
    pub fn shutdown(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            self.released.store(true, Ordering::Release);
            debug!(channel = %self.channel, "Subscription released");
        }
    }

    /// Check whether the subscription has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Shared flag that flips once this subscription is released.
    ///
    /// Lets callers observe teardown after the handle itself has been consumed.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}
