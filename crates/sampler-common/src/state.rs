//! Harness state machine for a single sampling run.
//!
//! State transitions follow the run lifecycle:
//! IDLE → SUBSCRIBED → WAITING → {PASSED | MISALIGNED | STALE | TIMED_OUT} → TORN_DOWN
//!
//! A subscription failure skips straight to TORN_DOWN so that every run,
//! whatever its outcome, ends with its subscriptions released.

use crate::error::{SamplerError, SamplerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Harness states for a sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarnessState {
    /// Nothing subscribed yet.
    #[default]
    Idle,
    /// Both channel subscriptions registered.
    Subscribed,
    /// Polling for both samples.
    Waiting,
    /// Both samples arrived, aligned and fresh.
    Passed,
    /// Both samples arrived with different timestamps.
    Misaligned,
    /// Both samples arrived aligned, but at least one was too old.
    Stale,
    /// The deadline passed before both samples arrived.
    TimedOut,
    /// Subscriptions released; the run is over.
    TornDown,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Subscribed => write!(f, "SUBSCRIBED"),
            Self::Waiting => write!(f, "WAITING"),
            Self::Passed => write!(f, "PASSED"),
            Self::Misaligned => write!(f, "MISALIGNED"),
            Self::Stale => write!(f, "STALE"),
            Self::TimedOut => write!(f, "TIMED_OUT"),
            Self::TornDown => write!(f, "TORN_DOWN"),
        }
    }
}

impl HarnessState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: HarnessState) -> bool {
        use HarnessState::{Idle, Misaligned, Passed, Stale, Subscribed, TimedOut, TornDown, Waiting};

        matches!(
            (self, target),
            // Normal forward progression
            (Idle, Subscribed)
                | (Subscribed, Waiting)
                // Verdicts
                | (Waiting, Passed)
                | (Waiting, Misaligned)
                | (Waiting, Stale)
                | (Waiting, TimedOut)
                // Teardown from every verdict
                | (Passed, TornDown)
                | (Misaligned, TornDown)
                | (Stale, TornDown)
                | (TimedOut, TornDown)
                // Subscription setup failed
                | (Idle, TornDown)
                | (Subscribed, TornDown)
        )
    }

    /// Returns true for the four run verdicts.
    #[must_use]
    pub fn is_verdict(&self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Misaligned | Self::Stale | Self::TimedOut
        )
    }

    /// Returns true if the run ended in a failing verdict.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Misaligned | Self::Stale | Self::TimedOut)
    }
}

/// State machine wrapper that remembers the run verdict.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current: HarnessState,
    verdict: Option<HarnessState>,
    transition_count: u64,
}

impl StateMachine {
    /// Create a new state machine starting in IDLE.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> HarnessState {
        self.current
    }

    /// Get the verdict reached before teardown, if any.
    #[must_use]
    pub fn verdict(&self) -> Option<HarnessState> {
        self.verdict
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: HarnessState) -> SamplerResult<()> {
        if !self.current.can_transition_to(target) {
            return Err(SamplerError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }

        tracing::debug!(from = %self.current, to = %target, "Harness state transition");
        if target.is_verdict() {
            self.verdict = Some(target);
        }
        self.current = target;
        self.transition_count += 1;
        Ok(())
    }

    /// Move to TORN_DOWN from wherever the run stopped.
    ///
    /// Does nothing if already torn down.
    pub fn tear_down(&mut self) -> SamplerResult<()> {
        if self.current == HarnessState::TornDown {
            return Ok(());
        }
        self.transition(HarnessState::TornDown)
    }
}
