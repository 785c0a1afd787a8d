//! Timed playback of decoded audio chunks

pub mod buffer;
pub mod ingest;
pub mod scheduler;


pub use buffer::{BufferTracker, BufferedExtent};
pub use ingest::{ChunkDecoder, ChunkIngest, IngestOutcome, PcmFormat, PcmPassthrough};
pub use scheduler::{PlaybackScheduler, ScheduledChunk, SchedulerState, SchedulerStats};
