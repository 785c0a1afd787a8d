use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::protocol::frame::FrameTypeTable;

/// Clock synchronizer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSyncConfig {
    /// Filter gain applied to each residual (default: 0.1)
    pub gain: f64,

    /// Raw offsets kept for the warm-up median (default: 10)
    pub median_window: usize,

    /// Accepted samples answered by the median before the drift filter
    /// takes over (default: 3)
    pub warmup_samples: u64,

    /// Samples with a longer round trip are discarded (default: 500ms,
    /// `None` accepts any non-negative round trip)
    pub max_round_trip: Option<Duration>,

    /// Drift estimate is clamped to this many microseconds per second
    /// (default: 500)
    pub max_drift: f64,

    /// Interval between clock exchanges run by the sync driver (default: 1 second)
    pub sync_interval: Duration,

    /// Timeout for a single clock exchange (default: 2 seconds)
    pub exchange_timeout: Duration,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            gain: 0.1,
            median_window: 10,
            warmup_samples: 3,
            max_round_trip: Some(Duration::from_millis(500)),
            max_drift: 500.0,
            sync_interval: Duration::from_secs(1),
            exchange_timeout: Duration::from_secs(2),
        }
    }
}

/// Admission control budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum buffered-but-unplayed bytes (default: 1 MiB)
    pub capacity_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 1024 * 1024,
        }
    }
}

/// Playback scheduler tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Dispatch tick period (default: 10ms)
    pub check_interval: Duration,

    /// Symmetric on-time tolerance around now (default: 50ms)
    pub playback_window: Duration,

    /// Pending chunks kept before the earliest is evicted (default: 100)
    pub max_queue_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(10),
            playback_window: Duration::from_millis(50),
            max_queue_size: 100,
        }
    }
}

impl SchedulerConfig {
    /// Playback window in microseconds
    #[must_use]
    pub fn playback_window_micros(&self) -> i64 {
        i64::try_from(self.playback_window.as_micros()).unwrap_or(i64::MAX)
    }
}

/// Configuration for the synchronization core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Clock synchronizer settings
    pub clock: ClockSyncConfig,
    /// Frame tag table
    pub frame: FrameTypeTable,
    /// Buffer tracker settings
    pub buffer: BufferConfig,
    /// Scheduler settings
    pub scheduler: SchedulerConfig,
}

impl SyncConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, message: &str| {
            Err(SyncError::InvalidConfig {
                name: name.to_string(),
                message: message.to_string(),
            })
        };

        if !(self.clock.gain > 0.0 && self.clock.gain <= 1.0) {
            return invalid("clock.gain", "must be in (0, 1]");
        }
        if self.clock.median_window == 0 {
            return invalid("clock.median_window", "must be at least 1");
        }
        if !(self.clock.max_drift.is_finite() && self.clock.max_drift >= 0.0) {
            return invalid("clock.max_drift", "must be a non-negative number");
        }
        if self.clock.sync_interval.is_zero() {
            return invalid("clock.sync_interval", "must be non-zero");
        }
        if self.frame.is_empty() {
            return invalid("frame", "at least one tag must be configured");
        }
        if self.scheduler.check_interval.is_zero() {
            return invalid("scheduler.check_interval", "must be non-zero");
        }
        if self.scheduler.max_queue_size == 0 {
            return invalid("scheduler.max_queue_size", "must be at least 1");
        }
        Ok(())
    }
}

/// Builder for `SyncConfig`
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the clock filter gain
    #[must_use]
    pub fn clock_gain(mut self, gain: f64) -> Self {
        self.config.clock.gain = gain;
        self
    }

    /// Set the round-trip outlier threshold
    #[must_use]
    pub fn max_round_trip(mut self, max: Option<Duration>) -> Self {
        self.config.clock.max_round_trip = max;
        self
    }

    /// Set the clock exchange interval
    #[must_use]
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.clock.sync_interval = interval;
        self
    }

    /// Set the tags that carry audio chunks
    #[must_use]
    pub fn audio_tags(mut self, tags: &[u8]) -> Self {
        self.config.frame = self.config.frame.with_audio_tags(tags);
        self
    }

    /// Set the admission control budget
    #[must_use]
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.buffer.capacity_bytes = bytes;
        self
    }

    /// Set the dispatch tick period
    #[must_use]
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.scheduler.check_interval = interval;
        self
    }

    /// Set the playback tolerance window
    #[must_use]
    pub fn playback_window(mut self, window: Duration) -> Self {
        self.config.scheduler.playback_window = window;
        self
    }

    /// Set the pending queue cap
    #[must_use]
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.scheduler.max_queue_size = size;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidConfig` if a value is out of range.
    pub fn build(self) -> Result<SyncConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
