//! Server clock synchronization.
//!
//! Estimates the offset and drift between the streaming server's clock and
//! the local clock from four-timestamp exchanges:
//!
//! ```text
//! Client                          Server
//!   |--- request (client_sent) ---->|  (server_received)
//!   |<--- reply (server_transmitted)|
//!   |  (client_received)            |
//!
//!   round_trip = (client_received - client_sent) - (server_transmitted - server_received)
//!   offset     = ((server_received - client_sent) + (server_transmitted - client_received)) / 2
//! ```
//!
//! The first few accepted samples are answered by the median of the recent
//! raw offsets; after that a drift-compensated filter owns the estimate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::local::LocalClock;
use crate::types::ClockSyncConfig;

/// Read-only time translation between the server and local clock domains
pub trait TimeBase: Send + Sync {
    /// Current absolute local time in microseconds
    fn now_local(&self) -> i64;

    /// Absolute local time at which the server clock reads `server_time`
    fn server_time_to_local(&self, server_time: i64) -> i64;

    /// Server clock reading at absolute local time `local_time`
    fn local_time_to_server(&self, local_time: i64) -> i64;
}

/// Timestamps from one request/response exchange, in microseconds.
///
/// Client values are process-relative local time, server values are in the
/// server clock domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSample {
    /// Client transmit time
    pub client_sent: i64,
    /// Server receive time
    pub server_received: i64,
    /// Server transmit time
    pub server_transmitted: i64,
    /// Client receive time
    pub client_received: i64,
}

impl ClockSample {
    /// Bundle the four exchange timestamps
    #[must_use]
    pub fn new(
        client_sent: i64,
        server_received: i64,
        server_transmitted: i64,
        client_received: i64,
    ) -> Self {
        Self {
            client_sent,
            server_received,
            server_transmitted,
            client_received,
        }
    }

    /// Network round trip excluding server processing time
    #[must_use]
    pub fn round_trip_delay(&self) -> i64 {
        let total = i128::from(self.client_received) - i128::from(self.client_sent);
        let processing = i128::from(self.server_transmitted) - i128::from(self.server_received);
        saturate(total - processing)
    }

    /// Offset (server - local) implied by this exchange alone
    #[must_use]
    pub fn raw_offset(&self) -> i64 {
        let outbound = i128::from(self.server_received) - i128::from(self.client_sent);
        let inbound = i128::from(self.server_transmitted) - i128::from(self.client_received);
        saturate((outbound + inbound) / 2)
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// Smoothed synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    /// Estimated server - local offset in microseconds
    pub offset: f64,
    /// Rate of change of the offset in microseconds per second
    pub drift: f64,
    /// Process-relative receive time of the last accepted sample
    pub last_sync_time: Option<i64>,
    /// Absolute local time at which the server clock read zero
    pub origin_absolute: i64,
    /// Number of accepted samples
    pub samples: u64,
}

impl ClockState {
    fn unsynchronized(local: &LocalClock) -> Self {
        Self {
            offset: 0.0,
            drift: 0.0,
            last_sync_time: None,
            origin_absolute: local.start_absolute_micros(),
            samples: 0,
        }
    }
}

struct Estimator {
    state: ClockState,
    /// Recent raw offsets for the warm-up median
    window: VecDeque<i64>,
}

/// Maps the server timeline onto the local clock.
///
/// Written by a single sync task, read concurrently by anything that needs
/// time translation. Offset, drift and origin are replaced together under
/// one lock so readers always see a consistent triple.
pub struct ClockSynchronizer {
    config: ClockSyncConfig,
    local: LocalClock,
    estimator: RwLock<Estimator>,
    rejected: AtomicU64,
}

impl ClockSynchronizer {
    /// Create an unsynchronized clock (offset 0, drift 0)
    #[must_use]
    pub fn new(config: ClockSyncConfig, local: LocalClock) -> Self {
        Self {
            estimator: RwLock::new(Estimator {
                state: ClockState::unsynchronized(&local),
                window: VecDeque::with_capacity(config.median_window),
            }),
            config,
            local,
            rejected: AtomicU64::new(0),
        }
    }

    /// The local clock used for both time domains
    #[must_use]
    pub fn local_clock(&self) -> &LocalClock {
        &self.local
    }

    /// Record one exchange given its four timestamps.
    ///
    /// Returns `true` if the sample was accepted.
    pub fn record_exchange(
        &self,
        client_sent: i64,
        server_received: i64,
        server_transmitted: i64,
        client_received: i64,
    ) -> bool {
        self.record_sample(ClockSample::new(
            client_sent,
            server_received,
            server_transmitted,
            client_received,
        ))
    }

    /// Record one exchange.
    ///
    /// Samples with a negative round trip, or one above the configured
    /// maximum, are discarded and leave the state untouched.
    ///
    /// Returns `true` if the sample was accepted.
    pub fn record_sample(&self, sample: ClockSample) -> bool {
        let rtt = sample.round_trip_delay();
        if rtt < 0 || self.exceeds_max_round_trip(rtt) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                rtt,
                max_rtt = ?self.config.max_round_trip,
                "Clock sync: rejecting sample with implausible round trip"
            );
            return false;
        }

        let raw_offset = sample.raw_offset();
        let mut estimator = self
            .estimator
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        estimator.window.push_back(raw_offset);
        while estimator.window.len() > self.config.median_window {
            estimator.window.pop_front();
        }

        let now = sample.client_received;
        let mut next = estimator.state;
        if next.samples < self.config.warmup_samples {
            next.offset = median(&estimator.window);
            next.drift = 0.0;
        } else {
            self.apply_filter(&mut next, raw_offset, now);
        }
        next.last_sync_time = Some(now);
        next.samples += 1;
        next.origin_absolute = self
            .local
            .start_absolute_micros()
            .saturating_sub(round_micros(next.offset));
        estimator.state = next;

        tracing::trace!(
            rtt,
            raw_offset,
            offset = next.offset,
            drift = next.drift,
            "Clock sync: sample accepted"
        );
        true
    }

    /// Drift-compensated update
    #[allow(clippy::cast_precision_loss)]
    fn apply_filter(&self, state: &mut ClockState, raw_offset: i64, now: i64) {
        let gain = self.config.gain;
        let raw = raw_offset as f64;
        let dt = state
            .last_sync_time
            .map_or(0.0, |last| now.saturating_sub(last) as f64 / 1_000_000.0);

        if dt <= 0.0 {
            // Same instant as the previous sample: nothing to learn about drift.
            state.offset += gain * (raw - state.offset);
            return;
        }

        let predicted = state.offset + state.drift * dt;
        let residual = raw - predicted;
        state.offset = predicted + gain * residual;
        let limit = self.config.max_drift.abs();
        state.drift = (state.drift + gain * (residual / dt)).max(-limit).min(limit);
    }

    fn exceeds_max_round_trip(&self, rtt: i64) -> bool {
        self.config
            .max_round_trip
            .is_some_and(|max| u128::from(rtt.unsigned_abs()) > max.as_micros())
    }

    /// Consistent copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ClockState {
        self.estimator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Current offset (server - local) in whole microseconds
    #[must_use]
    pub fn current_offset(&self) -> i64 {
        round_micros(self.snapshot().offset)
    }

    /// Current drift in microseconds per second
    #[must_use]
    pub fn current_drift(&self) -> f64 {
        self.snapshot().drift
    }

    /// Number of accepted samples
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.snapshot().samples
    }

    /// Number of discarded samples
    #[must_use]
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Whether warm-up is complete and the drift filter is active
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.sample_count() >= self.config.warmup_samples.max(1)
    }

    /// Forget all samples (offset returns to 0)
    pub fn reset(&self) {
        let mut estimator = self
            .estimator
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        estimator.state = ClockState::unsynchronized(&self.local);
        estimator.window.clear();
        self.rejected.store(0, Ordering::Relaxed);
        tracing::debug!("Clock sync: reset");
    }

    fn origin_absolute(&self) -> i64 {
        self.estimator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
            .origin_absolute
    }
}

impl TimeBase for ClockSynchronizer {
    fn now_local(&self) -> i64 {
        self.local.now_micros()
    }

    fn server_time_to_local(&self, server_time: i64) -> i64 {
        self.origin_absolute().saturating_add(server_time)
    }

    fn local_time_to_server(&self, local_time: i64) -> i64 {
        local_time.saturating_sub(self.origin_absolute())
    }
}

#[allow(clippy::cast_precision_loss)]
fn median(values: &VecDeque<i64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<i64> = values.iter().copied().collect();
    sorted.sort_unstable();
    sorted[sorted.len() / 2] as f64
}

#[allow(clippy::cast_possible_truncation)]
fn round_micros(value: f64) -> i64 {
    value.round() as i64
}
