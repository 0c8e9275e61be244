//! Configuration structures for the sampler harness.
//!
//! Supports TOML deserialization with defaults suited to a camera/depth pair:
//! 100ms polling, a 500ms freshness bound, and a 30s wait deadline.

use crate::error::{SamplerError, SamplerResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sleep between polls of the arrival flags.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Maximum age of a sample at assertion time (exclusive bound).
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,

    /// Overall deadline for both samples to arrive.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Channel names and subscription parameters.
    pub channels: ChannelConfig,

    /// Loopback source used by the command-line runner.
    pub source: SourceConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_age: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
            channels: ChannelConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

/// Channel subscription configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Primary image stream.
    pub primary: String,

    /// Depth image stream.
    pub depth: String,

    /// Per-subscription queue depth. Only the newest frames are kept.
    pub queue_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            primary: String::from("camera1/image_raw"),
            depth: String::from("camera1/depth/image_raw"),
            queue_size: 1,
        }
    }
}

/// How the loopback transport hands frames to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Callbacks run on the publishing thread.
    ///
    /// The harness may observe one channel updated and the other not yet,
    /// so a periodic producer can yield a torn pair.
    Immediate,
    /// Frames are queued and delivered when the harness spins.
    #[default]
    Queued,
}

/// Stamped frame source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Period between paired publications.
    #[serde(with = "humantime_serde")]
    pub publish_period: Duration,

    /// Delay before the first publication.
    #[serde(with = "humantime_serde")]
    pub start_delay: Duration,

    /// Fixed skew added to every depth stamp.
    #[serde(with = "humantime_serde")]
    pub depth_offset: Duration,

    /// Delivery mode of the loopback transport.
    pub delivery: DeliveryMode,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            publish_period: Duration::from_millis(50),
            start_delay: Duration::ZERO,
            depth_offset: Duration::ZERO,
            delivery: DeliveryMode::Queued,
        }
    }
}

impl SamplerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check that the configuration can drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::Config`] naming the first offending field.
    pub fn validate(&self) -> SamplerResult<()> {
        let zero = |field: &str| SamplerError::Config(format!("{field} must be non-zero"));

        if self.poll_interval.is_zero() {
            return Err(zero("poll_interval"));
        }
        if self.max_age.is_zero() {
            return Err(zero("max_age"));
        }
        if self.timeout.is_zero() {
            return Err(zero("timeout"));
        }
        if self.channels.queue_size == 0 {
            return Err(zero("channels.queue_size"));
        }
        if self.source.publish_period.is_zero() {
            return Err(zero("source.publish_period"));
        }
        if self.channels.primary == self.channels.depth {
            return Err(SamplerError::Config(format!(
                "primary and depth channels must differ (both are {:?})",
                self.channels.primary
            )));
        }
        if self.timeout < self.poll_interval {
            tracing::warn!(
                timeout = ?self.timeout,
                poll_interval = ?self.poll_interval,
                "Timeout shorter than poll interval; only one poll will run"
            );
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
