use crate::time::Timestamp;
use serde::{Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

/// Sampler error types covering subscription setup, waiting, and assertion failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    /// The transport could not resolve the channel name.
    #[error("channel unavailable: {channel}: {reason}")]
    ChannelUnavailable {
        /// Channel that failed to resolve.
        channel: String,
        /// Reason reported by the transport.
        reason: String,
    },

    /// The deadline passed with at least one sample still missing.
    #[error("timed out after {waited:?} waiting for {}", .missing.join(", "))]
    Timeout {
        /// Time spent waiting.
        waited: Duration,
        /// Channels that never delivered.
        missing: Vec<String>,
    },

    /// The two streams carried different timestamps.
    #[error("misaligned stamps: primary {primary}, depth {depth}")]
    Misaligned {
        /// Primary stream timestamp.
        primary: Timestamp,
        /// Depth stream timestamp.
        depth: Timestamp,
    },

    /// A sample was older than the freshness bound.
    #[error("stale sample on {channel}: stamp {stamp}, now {now}, max age {max_age:?}")]
    Stale {
        /// Channel carrying the stale sample.
        channel: String,
        /// Message timestamp.
        stamp: Timestamp,
        /// Clock reading used for the comparison.
        now: Timestamp,
        /// Configured freshness bound.
        max_age: Duration,
    },

    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid harness state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SamplerError {
    /// Returns true for alignment and freshness failures.
    #[must_use]
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, Self::Misaligned { .. } | Self::Stale { .. })
    }
}

impl Serialize for SamplerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Convenience type alias for sampler operations.
pub type SamplerResult<T> = Result<T, SamplerError>;
