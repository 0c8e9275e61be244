//! Paired stamp publisher.
//!
//! Publishes one frame on each of two channels every period, stamping both
//! from a single clock reading. This is the producer contract the harness
//! expects from a camera/depth pair; it carries no image content.
//!
//! The depth stamp can be skewed and the first publication delayed, to
//! reproduce misaligned producers and late starts.

use crate::clock::Clock;
use crate::loopback::Publisher;
use crate::transport::Frame;
use sampler_common::config::SourceConfig;
use sampler_common::error::{SamplerError, SamplerResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Shared state between the owner and the publishing thread.
#[derive(Debug, Default)]
struct PublisherState {
    stop_requested: AtomicBool,
    published: AtomicU64,
}

/// Background publisher feeding a primary and a depth channel.
pub struct PairedPublisher {
    state: Arc<PublisherState>,
    handle: Option<JoinHandle<()>>,
}

impl PairedPublisher {
    /// Start publishing on `primary` and `depth`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::Config`] if the period is zero or the thread
    /// cannot be spawned.
    pub fn start(
        primary: Publisher,
        depth: Publisher,
        clock: Arc<dyn Clock>,
        source: &SourceConfig,
    ) -> SamplerResult<Self> {
        if source.publish_period.is_zero() {
            return Err(SamplerError::Config(
                "publish_period must be non-zero".into(),
            ));
        }

        info!(
            primary = primary.channel(),
            depth = depth.channel(),
            period_ms = source.publish_period.as_millis(),
            depth_offset_ms = source.depth_offset.as_millis(),
            "Starting paired publisher"
        );

        let state = Arc::new(PublisherState::default());
        let thread_state = Arc::clone(&state);
        let period = source.publish_period;
        let start_delay = source.start_delay;
        let depth_offset = source.depth_offset;

        let handle = thread::Builder::new()
            .name("paired-publisher".into())
            .spawn(move || {
                if !sleep_unless_stopped(&thread_state, start_delay) {
                    return;
                }
                debug!("Paired publisher running");

                let mut next = Instant::now();
                while !thread_state.stop_requested.load(Ordering::Acquire) {
                    let stamp = clock.now();
                    let primary_frame = Frame {
                        stamp,
                        frame_id: primary.channel().to_string(),
                        payload: Vec::new(),
                    };
                    let depth_frame = Frame {
                        stamp: stamp.saturating_add(depth_offset),
                        frame_id: depth.channel().to_string(),
                        payload: Vec::new(),
                    };
                    primary.publish_paired(&primary_frame, &depth, &depth_frame);
                    thread_state.published.fetch_add(1, Ordering::Relaxed);

                    let now = Instant::now();
                    let wait = match next.checked_add(period) {
                        Some(due) if due > now => due - now,
                        // Fell behind; restart the cadence instead of bursting.
                        _ => period,
                    };
                    next = now.checked_add(wait).unwrap_or(now);
                    if !sleep_unless_stopped(&thread_state, wait) {
                        break;
                    }
                }
                debug!("Paired publisher stopped");
            })
            .map_err(|e| SamplerError::Config(format!("Failed to spawn publisher thread: {e}")))?;

        Ok(Self {
            state,
            handle: Some(handle),
        })
    }

    /// Number of frame pairs published so far.
    pub fn published(&self) -> u64 {
        self.state.published.load(Ordering::Relaxed)
    }

    /// Check if the publishing thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop publishing and join the thread.
    pub fn stop(&mut self) {
        self.state.stop_requested.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.join() {
                warn!("Publisher thread panicked: {:?}", e);
            }
            info!(pairs = self.published(), "Paired publisher stopped");
        }
    }
}

impl Drop for PairedPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleep in short slices so a stop request is honored promptly.
///
/// Returns false if a stop was requested. A `total` too large to represent as
/// an instant sleeps until the stop request.
fn sleep_unless_stopped(state: &PublisherState, total: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(5);

    let deadline = Instant::now().checked_add(total);
    loop {
        if state.stop_requested.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        let slice = match deadline {
            Some(deadline) if now >= deadline => return true,
            Some(deadline) => SLICE.min(deadline - now),
            None => SLICE,
        };
        thread::sleep(slice);
    }
}
