//! Buffered-bytes ledger for admission control

use std::collections::VecDeque;

/// Bytes that stay buffered until `end_time_local`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferedExtent {
    /// Absolute local time at which these bytes have finished playing
    pub end_time_local: i64,
    /// Size of the extent
    pub byte_count: usize,
}

/// Tracks how much decoded audio is waiting to be played
///
/// Advisory only: the ingestion path asks [`has_capacity`](Self::has_capacity)
/// before accepting a chunk, but nothing here is coupled to the scheduler's
/// own queue cap.
#[derive(Debug, Clone)]
pub struct BufferTracker {
    capacity: usize,
    extents: VecDeque<BufferedExtent>,
    usage: usize,
}

impl BufferTracker {
    /// Create a tracker with a byte budget
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            extents: VecDeque::new(),
            usage: 0,
        }
    }

    /// Whether `bytes` more would fit in the budget
    #[must_use]
    pub fn has_capacity(&self, bytes: usize) -> bool {
        self.usage
            .checked_add(bytes)
            .is_some_and(|total| total <= self.capacity)
    }

    /// Record bytes that will be buffered until `end_time_local`.
    ///
    /// Extents must be registered in non-decreasing end time order.
    pub fn register(&mut self, end_time_local: i64, byte_count: usize) {
        if let Some(last) = self.extents.back() {
            if end_time_local < last.end_time_local {
                tracing::debug!(
                    end_time_local,
                    last_end = last.end_time_local,
                    "Buffer tracker: extent registered out of order"
                );
            }
        }

        self.extents.push_back(BufferedExtent {
            end_time_local,
            byte_count,
        });
        self.usage = self.usage.saturating_add(byte_count);
    }

    /// Release every leading extent that has finished playing by `now_local`.
    ///
    /// Returns the number of bytes released.
    pub fn prune_consumed(&mut self, now_local: i64) -> usize {
        let mut released = 0;
        while let Some(front) = self.extents.front() {
            if front.end_time_local > now_local {
                break;
            }
            released += front.byte_count;
            self.usage = self.usage.saturating_sub(front.byte_count);
            self.extents.pop_front();
        }

        if released > 0 {
            tracing::trace!(released, usage = self.usage, "Buffer tracker: pruned");
        }
        released
    }

    /// Bytes currently buffered
    #[must_use]
    pub fn usage(&self) -> usize {
        self.usage
    }

    /// Byte budget
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tracked extents
    #[must_use]
    pub fn extent_count(&self) -> usize {
        self.extents.len()
    }

    /// Check if nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Forget all extents
    pub fn clear(&mut self) {
        self.extents.clear();
        self.usage = 0;
    }
}
