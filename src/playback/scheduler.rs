//! Timestamp-ordered playback scheduling
//!
//! Chunks wait in a queue sorted by local play time. A background task wakes
//! every `check_interval` and releases every chunk whose play time is within
//! `playback_window` of now, drops chunks that are further in the past, and
//! leaves future chunks queued.
//!
//! ```text
//!            late (dropped)   |   on time (emitted)   |   early (kept)
//!   ------------------------- | --------- now ------- | ---------------->
//!                     now - window                now + window
//! ```
//!
//! Both window edges are inclusive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::TimeBase;
use crate::types::SchedulerConfig;

/// A decoded chunk waiting for (or released at) its play time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledChunk {
    /// PCM bytes
    pub payload: Bytes,
    /// Absolute local time at which the chunk should reach the output
    pub play_time: i64,
    /// Timestamp the chunk carried on the wire
    pub server_timestamp: i64,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Chunks passed to `schedule`
    pub received: u64,
    /// Chunks emitted on the output channel
    pub played: u64,
    /// Chunks discarded, for lateness or overflow
    pub dropped: u64,
    /// Part of `dropped` evicted by the queue cap
    pub overflowed: u64,
    /// Chunks currently pending
    pub queue_depth: usize,
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, never started
    Idle,
    /// Dispatch task active
    Running,
    /// Dispatch paused; queue and output channel intact
    Stopped,
    /// Torn down; output channel closed
    Finished,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    played: AtomicU64,
    dropped: AtomicU64,
    overflowed: AtomicU64,
    queue_depth: AtomicUsize,
}

struct Pending {
    chunks: VecDeque<ScheduledChunk>,
    /// `None` once finished
    output: Option<mpsc::UnboundedSender<ScheduledChunk>>,
}

struct Shared {
    config: SchedulerConfig,
    time: Arc<dyn TimeBase>,
    pending: Mutex<Pending>,
    counters: Counters,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drop_chunks(&self, count: u64) {
        self.counters.dropped.fetch_add(count, Ordering::AcqRel);
    }

    /// Release everything due, drop everything stale
    fn tick(&self) {
        let now = self.time.now_local();
        let window = self.config.playback_window_micros();
        let mut pending = self.lock();

        while let Some(head) = pending.chunks.front() {
            let delay = head.play_time.saturating_sub(now);
            if delay > window {
                break;
            }
            let Some(chunk) = pending.chunks.pop_front() else {
                break;
            };

            if delay < -window {
                tracing::debug!(
                    server_timestamp = chunk.server_timestamp,
                    late_by = delay.unsigned_abs(),
                    "Scheduler: dropping late chunk"
                );
                self.drop_chunks(1);
                continue;
            }

            let delivered = pending
                .output
                .as_ref()
                .is_some_and(|tx| tx.send(chunk).is_ok());
            if delivered {
                self.counters.played.fetch_add(1, Ordering::AcqRel);
            } else {
                tracing::trace!("Scheduler: output closed, discarding due chunk");
                self.drop_chunks(1);
            }
        }

        self.counters
            .queue_depth
            .store(pending.chunks.len(), Ordering::Release);
    }
}

struct Control {
    state: SchedulerState,
    task: Option<(CancellationToken, JoinHandle<()>)>,
}

/// Releases chunks at their local play time
///
/// `schedule`, the dispatch task and the consumer of the output channel may
/// all run on different tasks; the queue is guarded by a mutex that is never
/// held across an await point.
pub struct PlaybackScheduler {
    shared: Arc<Shared>,
    control: tokio::sync::Mutex<Control>,
}

impl PlaybackScheduler {
    /// Create an idle scheduler and the consumer end of its output channel
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        time: Arc<dyn TimeBase>,
    ) -> (Self, mpsc::UnboundedReceiver<ScheduledChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            shared: Arc::new(Shared {
                config,
                time,
                pending: Mutex::new(Pending {
                    chunks: VecDeque::new(),
                    output: Some(tx),
                }),
                counters: Counters::default(),
            }),
            control: tokio::sync::Mutex::new(Control {
                state: SchedulerState::Idle,
                task: None,
            }),
        };
        (scheduler, rx)
    }

    /// Queue a chunk for playback at the local time matching `server_timestamp`.
    ///
    /// Never fails. When the queue exceeds `max_queue_size` the chunk with the
    /// earliest play time is evicted.
    ///
    /// Returns the local play time assigned to the chunk.
    pub fn schedule(&self, payload: impl Into<Bytes>, server_timestamp: i64) -> i64 {
        let counters = &self.shared.counters;
        counters.received.fetch_add(1, Ordering::AcqRel);

        let play_time = self.shared.time.server_time_to_local(server_timestamp);
        let chunk = ScheduledChunk {
            payload: payload.into(),
            play_time,
            server_timestamp,
        };

        let mut pending = self.shared.lock();
        if pending.output.is_none() {
            tracing::trace!(server_timestamp, "Scheduler: finished, discarding chunk");
            self.shared.drop_chunks(1);
            return play_time;
        }

        let pos = pending
            .chunks
            .partition_point(|c| c.play_time < chunk.play_time);
        tracing::trace!(
            server_timestamp,
            play_time = chunk.play_time,
            pos,
            "Scheduler: chunk queued"
        );
        pending.chunks.insert(pos, chunk);

        while pending.chunks.len() > self.shared.config.max_queue_size {
            if let Some(evicted) = pending.chunks.pop_front() {
                tracing::debug!(
                    server_timestamp = evicted.server_timestamp,
                    "Scheduler: queue full, evicting earliest chunk"
                );
                self.shared.drop_chunks(1);
                counters.overflowed.fetch_add(1, Ordering::AcqRel);
            }
        }

        counters
            .queue_depth
            .store(pending.chunks.len(), Ordering::Release);
        play_time
    }

    /// Start the dispatch task. No-op if already running or finished.
    pub async fn start(&self) {
        let mut control = self.control.lock().await;
        match control.state {
            SchedulerState::Running => return,
            SchedulerState::Finished => {
                tracing::warn!("Scheduler: start called after finish, ignoring");
                return;
            }
            SchedulerState::Idle | SchedulerState::Stopped => {}
        }

        let token = CancellationToken::new();
        let shared = self.shared.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(shared.config.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => shared.tick(),
                }
            }
        });

        control.task = Some((token, handle));
        control.state = SchedulerState::Running;
        tracing::info!(
            check_interval = ?self.shared.config.check_interval,
            "Scheduler: started"
        );
    }

    /// Pause dispatch, keeping the queue and output channel.
    ///
    /// Returns once the dispatch task has exited. No-op unless running.
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        if control.state != SchedulerState::Running {
            return;
        }
        Self::join_task(&mut control).await;
        control.state = SchedulerState::Stopped;
        tracing::info!("Scheduler: stopped");
    }

    /// Tear down permanently: stop dispatch, discard the queue and close
    /// the output channel.
    pub async fn finish(&self) {
        let mut control = self.control.lock().await;
        if control.state == SchedulerState::Finished {
            return;
        }
        Self::join_task(&mut control).await;
        control.state = SchedulerState::Finished;

        let mut pending = self.shared.lock();
        let discarded = pending.chunks.len();
        pending.chunks.clear();
        pending.output = None;
        self.shared
            .counters
            .queue_depth
            .store(0, Ordering::Release);
        drop(pending);

        tracing::info!(discarded, "Scheduler: finished");
    }

    async fn join_task(control: &mut Control) {
        if let Some((token, handle)) = control.task.take() {
            token.cancel();
            if let Err(e) = handle.await {
                tracing::error!("Scheduler dispatch task failed: {}", e);
            }
        }
    }

    /// Empty the queue without touching lifecycle or counters.
    ///
    /// Returns the number of chunks discarded.
    pub fn clear(&self) -> usize {
        let mut pending = self.shared.lock();
        let cleared = pending.chunks.len();
        pending.chunks.clear();
        self.shared
            .counters
            .queue_depth
            .store(0, Ordering::Release);
        tracing::debug!(cleared, "Scheduler: queue cleared");
        cleared
    }

    /// Snapshot of the counters. Never blocks.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.shared.counters;
        // Outcomes before `received` so a snapshot never shows more
        // outcomes than arrivals.
        let played = counters.played.load(Ordering::Acquire);
        let dropped = counters.dropped.load(Ordering::Acquire);
        let overflowed = counters.overflowed.load(Ordering::Acquire);
        let queue_depth = counters.queue_depth.load(Ordering::Acquire);
        let received = counters.received.load(Ordering::Acquire);

        SchedulerStats {
            received,
            played,
            dropped,
            overflowed,
            queue_depth,
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SchedulerState {
        self.control.lock().await.state
    }

    /// Whether `finish` has closed the output channel
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.lock().output.is_none()
    }

    /// Play times of the pending chunks, in queue order
    #[must_use]
    pub fn queue_snapshot(&self) -> Vec<i64> {
        self.shared
            .lock()
            .chunks
            .iter()
            .map(|c| c.play_time)
            .collect()
    }

    /// Scheduler settings
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        if let Some((token, _)) = self.control.get_mut().task.take() {
            token.cancel();
        }
    }
}
