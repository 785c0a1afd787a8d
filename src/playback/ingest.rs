//! Ingestion path from wire frames to the scheduler
//!
//! ```text
//! transport bytes -> FrameDecoder -> ChunkDecoder (codec) -> BufferTracker
//!                                                           -> PlaybackScheduler
//! ```
//!
//! Artwork and visualizer frames are handed back to the caller untouched.

use std::sync::Arc;

use bytes::Bytes;

use super::buffer::BufferTracker;
use super::scheduler::PlaybackScheduler;
use crate::clock::TimeBase;
use crate::error::{Result, SyncError};
use crate::protocol::frame::{FrameDecoder, FrameType};
use crate::types::SyncConfig;

/// Codec capability turning an encoded chunk into PCM
pub trait ChunkDecoder: Send {
    /// Decode one chunk
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Codec` if the chunk cannot be decoded.
    fn decode(&mut self, encoded: Bytes) -> Result<Bytes>;
}

/// Decoder for streams that already carry PCM
#[derive(Debug, Clone, Copy, Default)]
pub struct PcmPassthrough;

impl ChunkDecoder for PcmPassthrough {
    fn decode(&mut self, encoded: Bytes) -> Result<Bytes> {
        Ok(encoded)
    }
}

/// Interleaved PCM layout, used to size buffered extents in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channels
    pub channels: u16,
    /// Bits per sample
    pub bit_depth: u16,
}

impl PcmFormat {
    /// 48 kHz stereo 16-bit
    pub const DEFAULT: Self = Self {
        sample_rate: 48_000,
        channels: 2,
        bit_depth: 16,
    };

    /// Get bytes per frame
    #[must_use]
    pub fn bytes_per_frame(self) -> usize {
        usize::from(self.bit_depth / 8) * usize::from(self.channels)
    }

    /// Get bytes per second
    #[must_use]
    pub fn bytes_per_second(self) -> u64 {
        self.bytes_per_frame() as u64 * u64::from(self.sample_rate)
    }

    /// Playback duration of `bytes` of PCM, in microseconds
    #[must_use]
    pub fn duration_micros(self, bytes: usize) -> i64 {
        let per_second = self.bytes_per_second();
        if per_second == 0 {
            return 0;
        }
        let micros = u128::from(bytes as u64) * 1_000_000 / u128::from(per_second);
        i64::try_from(micros).unwrap_or(i64::MAX)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Audio chunk queued for playback
    Scheduled {
        /// Absolute local play time
        play_time: i64,
        /// Decoded PCM size
        bytes: usize,
    },
    /// Audio chunk refused because the buffer budget is exhausted
    Backpressure {
        /// Server timestamp of the refused chunk
        timestamp: i64,
        /// Decoded PCM size
        bytes: usize,
    },
    /// Artwork image for a channel
    Artwork {
        /// Artwork channel (0-3)
        channel: u8,
        /// Server timestamp
        timestamp: i64,
        /// Image bytes (empty clears the artwork)
        data: Bytes,
    },
    /// Visualizer data
    Visualizer {
        /// Server timestamp
        timestamp: i64,
        /// Raw visualizer payload
        data: Bytes,
    },
}

/// Feeds decoded audio into a scheduler under buffer admission control
pub struct ChunkIngest<D: ChunkDecoder> {
    frames: FrameDecoder,
    decoder: D,
    buffer: BufferTracker,
    format: PcmFormat,
    scheduler: Arc<PlaybackScheduler>,
    time: Arc<dyn TimeBase>,
}

impl<D: ChunkDecoder> ChunkIngest<D> {
    /// Create an ingestion path for one stream
    #[must_use]
    pub fn new(
        config: &SyncConfig,
        decoder: D,
        format: PcmFormat,
        scheduler: Arc<PlaybackScheduler>,
        time: Arc<dyn TimeBase>,
    ) -> Self {
        Self {
            frames: FrameDecoder::new(config.frame.clone()),
            decoder,
            buffer: BufferTracker::new(config.buffer.capacity_bytes),
            format,
            scheduler,
            time,
        }
    }

    /// Process one frame from the transport.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Frame` for malformed frames and `SyncError::Codec`
    /// when the chunk cannot be decoded. Both are per-frame: drop the frame
    /// and keep going. Audio arriving after the scheduler has finished
    /// yields `SyncError::Finished`.
    pub fn handle_frame(&mut self, data: &[u8]) -> Result<IngestOutcome> {
        let frame = self.frames.decode(data)?;

        match frame.frame_type {
            FrameType::Artwork(channel) => Ok(IngestOutcome::Artwork {
                channel,
                timestamp: frame.timestamp,
                data: frame.payload,
            }),
            FrameType::Visualizer => Ok(IngestOutcome::Visualizer {
                timestamp: frame.timestamp,
                data: frame.payload,
            }),
            FrameType::AudioChunk => {
                if self.scheduler.is_finished() {
                    return Err(SyncError::Finished);
                }
                self.buffer.prune_consumed(self.time.now_local());

                let pcm = self.decoder.decode(frame.payload)?;
                let bytes = pcm.len();
                if !self.buffer.has_capacity(bytes) {
                    tracing::debug!(
                        timestamp = frame.timestamp,
                        bytes,
                        usage = self.buffer.usage(),
                        "Ingest: buffer full, refusing chunk"
                    );
                    return Ok(IngestOutcome::Backpressure {
                        timestamp: frame.timestamp,
                        bytes,
                    });
                }

                let play_time = self.scheduler.schedule(pcm, frame.timestamp);
                let end_time = play_time.saturating_add(self.format.duration_micros(bytes));
                self.buffer.register(end_time, bytes);

                Ok(IngestOutcome::Scheduled { play_time, bytes })
            }
        }
    }

    /// Change the PCM layout and drop everything queued for the old one
    pub fn set_format(&mut self, format: PcmFormat) {
        self.format = format;
        self.reset();
    }

    /// Drop all buffered and queued audio
    pub fn reset(&mut self) {
        self.buffer.clear();
        let cleared = self.scheduler.clear();
        tracing::debug!(cleared, "Ingest: reset");
    }

    /// Admission control ledger
    #[must_use]
    pub fn buffer(&self) -> &BufferTracker {
        &self.buffer
    }

    /// PCM layout in use
    #[must_use]
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Scheduler receiving the chunks
    #[must_use]
    pub fn scheduler(&self) -> &Arc<PlaybackScheduler> {
        &self.scheduler
    }
}
