//! Local monotonic time source

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Local clock with two time domains
///
/// - *process-relative*: microseconds since the clock was created; the
///   client timestamps of a clock exchange are taken in this domain.
/// - *absolute*: `start_absolute + process-relative`; every play time and
///   every value returned by time translation lives here.
///
/// Both advance with the same monotonic source, so converting between
/// them is a fixed shift. Never subtract a value of one domain from a
/// value of the other.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    start: Instant,
    start_absolute: i64,
}

impl LocalClock {
    /// Create a clock anchored at the current wall-clock time
    #[must_use]
    pub fn new() -> Self {
        let start_absolute = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX));
        Self::with_anchor(start_absolute)
    }

    /// Create a clock whose absolute domain starts at `start_absolute`
    #[must_use]
    pub fn with_anchor(start_absolute: i64) -> Self {
        Self {
            start: Instant::now(),
            start_absolute,
        }
    }

    /// Absolute local time at creation, in microseconds
    #[must_use]
    pub fn start_absolute_micros(&self) -> i64 {
        self.start_absolute
    }

    /// Process-relative microseconds
    #[must_use]
    pub fn elapsed_micros(&self) -> i64 {
        i64::try_from(self.start.elapsed().as_micros()).unwrap_or(i64::MAX)
    }

    /// Absolute local microseconds
    #[must_use]
    pub fn now_micros(&self) -> i64 {
        self.start_absolute.saturating_add(self.elapsed_micros())
    }

    /// Convert a process-relative value to the absolute domain
    #[must_use]
    pub fn to_absolute(&self, relative: i64) -> i64 {
        self.start_absolute.saturating_add(relative)
    }

    /// Convert an absolute value to the process-relative domain
    #[must_use]
    pub fn to_relative(&self, absolute: i64) -> i64 {
        absolute.saturating_sub(self.start_absolute)
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new()
    }
}
