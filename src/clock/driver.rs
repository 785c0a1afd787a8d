//! Periodic clock exchange task
//!
//! The exchange itself travels over the application's control channel, so
//! it is abstracted behind [`TimeExchange`]. The driver is the single writer
//! of a [`ClockSynchronizer`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::sync::{ClockSample, ClockSynchronizer};
use crate::error::{Result, SyncError};

/// Server half of a clock exchange, in server clock microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimes {
    /// When the server received the request
    pub server_received: i64,
    /// When the server sent the reply
    pub server_transmitted: i64,
}

/// One request/response round with the server
#[async_trait]
pub trait TimeExchange: Send {
    /// Send a time request stamped `client_sent` (process-relative
    /// microseconds) and wait for the server's reply.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Exchange` if the request cannot be delivered or
    /// the reply is malformed.
    async fn exchange(&mut self, client_sent: i64) -> Result<ServerTimes>;
}

/// Background task feeding a clock synchronizer
pub struct ClockSyncDriver {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ClockSyncDriver {
    /// Start exchanging every `interval`, giving each round `timeout`
    #[must_use]
    pub fn spawn<E>(
        clock: Arc<ClockSynchronizer>,
        mut exchange: E,
        interval: Duration,
        timeout: Duration,
    ) -> Self
    where
        E: TimeExchange + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(?interval, "Clock sync: driver started");

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let result = tokio::select! {
                    () = token.cancelled() => break,
                    result = run_exchange(&clock, &mut exchange, timeout) => result,
                };

                match result {
                    Ok(accepted) => tracing::trace!(
                        accepted,
                        offset = clock.current_offset(),
                        "Clock sync: exchange complete"
                    ),
                    Err(e) => tracing::warn!("Clock sync: exchange failed: {}", e),
                }
            }

            tracing::info!("Clock sync: driver stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Whether the task is still alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the task and wait for it to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Clock sync driver task failed: {}", e);
            }
        }
    }
}

impl Drop for ClockSyncDriver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_exchange<E: TimeExchange>(
    clock: &ClockSynchronizer,
    exchange: &mut E,
    timeout: Duration,
) -> Result<bool> {
    let local = *clock.local_clock();
    let client_sent = local.elapsed_micros();

    let times = tokio::time::timeout(timeout, exchange.exchange(client_sent))
        .await
        .map_err(|_| SyncError::ExchangeTimeout { duration: timeout })??;

    let client_received = local.elapsed_micros();
    Ok(clock.record_sample(ClockSample::new(
        client_sent,
        times.server_received,
        times.server_transmitted,
        client_received,
    )))
}
