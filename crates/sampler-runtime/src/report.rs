//! Run report.
//!
//! A [`SamplerReport`] is the pass/fail result of one run plus everything
//! needed to diagnose a failure: both stamps, their ages, delivery counts,
//! and whether each subscription was released.

use sampler_common::error::{SamplerError, SamplerResult};
use sampler_common::state::HarnessState;
use sampler_common::time::Timestamp;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Both samples arrived, aligned and fresh.
    Passed,
    /// The two stamps differed.
    Misaligned,
    /// Stamps matched but at least one was too old.
    Stale,
    /// At least one channel never delivered.
    TimedOut,
    /// A subscription could not be set up.
    ChannelUnavailable,
    /// The configuration failed validation; nothing was subscribed.
    InvalidConfig,
}

impl RunOutcome {
    /// Harness verdict state for outcomes reached by waiting.
    #[must_use]
    pub fn verdict(&self) -> Option<HarnessState> {
        match self {
            Self::Passed => Some(HarnessState::Passed),
            Self::Misaligned => Some(HarnessState::Misaligned),
            Self::Stale => Some(HarnessState::Stale),
            Self::TimedOut => Some(HarnessState::TimedOut),
            Self::ChannelUnavailable | Self::InvalidConfig => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Misaligned => write!(f, "misaligned"),
            Self::Stale => write!(f, "stale"),
            Self::TimedOut => write!(f, "timed out"),
            Self::ChannelUnavailable => write!(f, "channel unavailable"),
            Self::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}

/// What the harness saw on one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReading {
    /// Channel name.
    pub channel: String,
    /// Stamp used by the checks; `None` if the wait never completed.
    pub stamp: Option<Timestamp>,
    /// Signed age of the stamp at check time, in seconds.
    pub age_secs: Option<f64>,
    /// Result of the freshness check.
    pub fresh: Option<bool>,
    /// Frames delivered to this channel's callback.
    pub deliveries: u64,
    /// No live subscription remains for this channel.
    pub released: bool,
}

/// Result of one sampling run.
#[derive(Debug, Clone, Serialize)]
pub struct SamplerReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Harness state when the run returned.
    pub final_state: HarnessState,
    /// Primary stream reading.
    pub primary: SampleReading,
    /// Depth stream reading.
    pub depth: SampleReading,
    /// Result of the alignment check, if it ran.
    pub aligned: Option<bool>,
    /// Time spent waiting for both samples.
    #[serde(rename = "waited_secs", serialize_with = "serialize_secs")]
    pub waited: Duration,
    /// Every failed check, in evaluation order.
    pub failures: Vec<SamplerError>,
}

impl SamplerReport {
    /// Returns true if every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == RunOutcome::Passed && self.failures.is_empty()
    }

    /// Convert into a result carrying the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first recorded failure if the run did not pass.
    pub fn into_result(self) -> SamplerResult<()> {
        match self.failures.into_iter().next() {
            Some(first) => Err(first),
            None if self.outcome == RunOutcome::Passed => Ok(()),
            None => Err(SamplerError::Config(format!(
                "run ended as {} without a recorded failure",
                self.outcome
            ))),
        }
    }

    /// Process exit code: 0 on pass, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.passed())
    }
}

fn serialize_secs<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(d.as_secs_f64())
}
