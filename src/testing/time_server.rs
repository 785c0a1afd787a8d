//! Simulated streaming server clock for testing

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::clock::{LocalClock, ServerTimes, TimeExchange};
use crate::error::{Result, SyncError};

/// Server clock simulator answering clock exchanges
///
/// The server clock reads `offset + elapsed * (1 + drift / 1e6)` where
/// `elapsed` is the process-relative time of the shared [`LocalClock`].
/// Each leg sleeps for its base delay plus up to `jitter` of random extra
/// delay, so it cooperates with paused tokio time.
#[derive(Clone, Debug)]
pub struct SimulatedTimeServer {
    clock: LocalClock,
    /// True server - local offset in microseconds
    pub offset: i64,
    /// Server clock rate error in microseconds per second
    pub drift: f64,
    /// Client to server delay
    pub outbound_delay: Duration,
    /// Server to client delay
    pub return_delay: Duration,
    /// Time between server receive and transmit
    pub processing: Duration,
    /// Maximum random extra delay per leg
    pub jitter: Duration,
    /// Fail every n-th exchange (0 disables)
    pub fail_every: u32,
    exchanges: u32,
}

impl SimulatedTimeServer {
    /// Server with a fixed offset over a perfect symmetric network
    #[must_use]
    pub fn new(clock: LocalClock, offset: i64) -> Self {
        Self {
            clock,
            offset,
            drift: 0.0,
            outbound_delay: Duration::from_millis(2),
            return_delay: Duration::from_millis(2),
            processing: Duration::from_micros(100),
            jitter: Duration::ZERO,
            fail_every: 0,
            exchanges: 0,
        }
    }

    /// Add random per-leg jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Add clock rate error
    #[must_use]
    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// Make every n-th exchange fail
    #[must_use]
    pub fn with_failures(mut self, fail_every: u32) -> Self {
        self.fail_every = fail_every;
        self
    }

    /// Number of exchanges attempted so far
    #[must_use]
    pub fn exchange_count(&self) -> u32 {
        self.exchanges
    }

    /// Current reading of the simulated server clock
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn server_now(&self) -> i64 {
        let elapsed = self.clock.elapsed_micros();
        let skew = (elapsed as f64 * self.drift / 1_000_000.0) as i64;
        self.offset + elapsed + skew
    }

    fn leg_delay(&self, base: Duration) -> Duration {
        if self.jitter.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_micros());
        base + Duration::from_micros(u64::try_from(extra).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl TimeExchange for SimulatedTimeServer {
    async fn exchange(&mut self, _client_sent: i64) -> Result<ServerTimes> {
        self.exchanges += 1;
        if self.fail_every > 0 && self.exchanges % self.fail_every == 0 {
            return Err(SyncError::Exchange {
                message: format!("simulated loss of exchange {}", self.exchanges),
            });
        }

        tokio::time::sleep(self.leg_delay(self.outbound_delay)).await;
        let server_received = self.server_now();
        tokio::time::sleep(self.processing).await;
        let server_transmitted = self.server_now();
        tokio::time::sleep(self.leg_delay(self.return_delay)).await;

        Ok(ServerTimes {
            server_received,
            server_transmitted,
        })
    }
}
