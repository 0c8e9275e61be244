//! In-process loopback transport.
//!
//! Publishers and subscribers share one registry of channels. A channel exists
//! once something advertises it; subscribing to anything else fails with
//! [`SamplerError::ChannelUnavailable`], the same way a middleware reports an
//! unresolvable topic.
//!
//! Two delivery modes cover both threading models the harness must handle:
//!
//! - [`DeliveryMode::Immediate`]: the callback runs on the publisher's thread
//! - [`DeliveryMode::Queued`]: frames wait in a per-subscriber queue until
//!   [`Transport::spin_once`] drains them on the caller's thread

use crate::transport::{validate_channel_name, Frame, FrameCallback, Subscription, Transport};
use sampler_common::config::DeliveryMode;
use sampler_common::error::{SamplerError, SamplerResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace};

struct Subscriber {
    id: u64,
    callback: FrameCallback,
    queue: Mutex<VecDeque<Frame>>,
    queue_size: usize,
}

impl Subscriber {
    fn enqueue(&self, frame: Frame) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        while queue.len() >= self.queue_size {
            queue.pop_front();
        }
        queue.push_back(frame);
    }

    fn drain(&self) -> Vec<Frame> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.drain(..).collect()
    }
}

struct Registry {
    mode: DeliveryMode,
    next_id: AtomicU64,
    channels: Mutex<HashMap<String, Vec<Arc<Subscriber>>>>,
}

impl Registry {
    fn channels(&self) -> MutexGuard<'_, HashMap<String, Vec<Arc<Subscriber>>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot subscribers so callbacks run without the registry lock held.
    fn subscribers(&self, channel: &str) -> Vec<Arc<Subscriber>> {
        self.channels().get(channel).cloned().unwrap_or_default()
    }

    fn remove(&self, channel: &str, id: u64) {
        if let Some(subs) = self.channels().get_mut(channel) {
            subs.retain(|s| s.id != id);
        }
    }
}

/// In-process publish/subscribe transport.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct LoopbackTransport {
    registry: Arc<Registry>,
}

impl LoopbackTransport {
    /// Create an empty transport with the given delivery mode.
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            registry: Arc::new(Registry {
                mode,
                next_id: AtomicU64::new(1),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Delivery mode in use.
    pub fn mode(&self) -> DeliveryMode {
        self.registry.mode
    }

    /// Make `channel` resolvable and return a publisher for it.
    ///
    /// Advertising an existing channel returns another publisher for it.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::ChannelUnavailable`] for malformed names.
    pub fn advertise(&self, channel: &str) -> SamplerResult<Publisher> {
        validate_channel_name(channel)?;
        self.registry
            .channels()
            .entry(channel.to_string())
            .or_default();
        debug!(channel, mode = ?self.registry.mode, "Channel advertised");

        Ok(Publisher {
            channel: channel.to_string(),
            registry: Arc::clone(&self.registry),
        })
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(DeliveryMode::default())
    }
}

impl Transport for LoopbackTransport {
    fn subscribe(
        &self,
        channel: &str,
        queue_size: usize,
        callback: FrameCallback,
    ) -> SamplerResult<Subscription> {
        validate_channel_name(channel)?;

        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut channels = self.registry.channels();
            let Some(subs) = channels.get_mut(channel) else {
                return Err(SamplerError::ChannelUnavailable {
                    channel: channel.to_string(),
                    reason: "no publisher has advertised this channel".to_string(),
                });
            };
            subs.push(Arc::new(Subscriber {
                id,
                callback,
                queue: Mutex::new(VecDeque::with_capacity(queue_size.max(1))),
                queue_size: queue_size.max(1),
            }));
        }
        debug!(channel, id, queue_size, "Subscribed");

        // Weak so a leaked handle does not keep the registry alive.
        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        let owned_channel = channel.to_string();
        Ok(Subscription::new(channel, move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(&owned_channel, id);
            }
        }))
    }

    fn spin_once(&self) {
        // Drain every queue under the registry lock so a paired publication is
        // seen whole or not at all; callbacks run after the lock is released.
        let pending: Vec<(Arc<Subscriber>, Vec<Frame>)> = self
            .registry
            .channels()
            .values()
            .flatten()
            .map(|sub| (Arc::clone(sub), sub.drain()))
            .filter(|(_, frames)| !frames.is_empty())
            .collect();

        for (sub, frames) in pending {
            for frame in &frames {
                (sub.callback)(frame);
            }
        }
    }

    fn subscriber_count(&self, channel: &str) -> usize {
        self.registry.channels().get(channel).map_or(0, Vec::len)
    }
}

/// Sending end of an advertised channel.
#[derive(Clone)]
pub struct Publisher {
    channel: String,
    registry: Arc<Registry>,
}

impl Publisher {
    /// Channel this publisher sends on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a frame to every current subscriber.
    ///
    /// Returns the number of subscribers the frame was handed to.
    pub fn publish(&self, frame: &Frame) -> usize {
        let subscribers = self.registry.subscribers(&self.channel);
        trace!(channel = %self.channel, stamp = %frame.stamp, subscribers = subscribers.len(), "Publish");

        match self.registry.mode {
            DeliveryMode::Immediate => {
                for sub in &subscribers {
                    (sub.callback)(frame);
                }
            }
            DeliveryMode::Queued => {
                for sub in &subscribers {
                    sub.enqueue(frame.clone());
                }
            }
        }
        subscribers.len()
    }

    /// Publish `frame` here and `other_frame` on `other` as one unit.
    ///
    /// In queued mode both frames are enqueued under the registry lock, so a
    /// spinning subscriber never sees one without the other. In immediate mode
    /// the callbacks simply run back to back. Publishers from different
    /// transports fall back to two independent publications.
    ///
    /// Returns the total number of subscribers reached.
    pub fn publish_paired(&self, frame: &Frame, other: &Publisher, other_frame: &Frame) -> usize {
        let shared = Arc::ptr_eq(&self.registry, &other.registry);
        if !shared || self.registry.mode == DeliveryMode::Immediate {
            return self.publish(frame) + other.publish(other_frame);
        }

        let channels = self.registry.channels();
        let mut reached = 0;
        for (channel, frame) in [(&self.channel, frame), (&other.channel, other_frame)] {
            for sub in channels.get(channel).into_iter().flatten() {
                sub.enqueue(frame.clone());
                reached += 1;
            }
        }
        trace!(
            channel = %self.channel,
            other = %other.channel,
            stamp = %frame.stamp,
            reached,
            "Publish paired"
        );
        reached
    }

    /// Number of live subscriptions on this channel.
    pub fn subscriber_count(&self) -> usize {
        self.registry.channels().get(&self.channel).map_or(0, Vec::len)
    }
}
