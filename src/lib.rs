//! # roomsync
//!
//! Synchronization core for multi-room audio clients: decides, for every
//! decoded audio chunk, the local moment it must reach the output so that
//! independent clients stay in step despite network jitter and clock drift.
//!
//! ## Features
//!
//! - Server clock tracking with a drift-compensated offset filter
//! - Binary chunk frame decoding with configurable type tags
//! - Buffer admission control
//! - Timestamp-ordered playback scheduling with a bounded tolerance window
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use roomsync::{ClockSynchronizer, LocalClock, PlaybackScheduler, SyncConfig};
//!
//! # async fn example() -> Result<(), roomsync::SyncError> {
//! let config = SyncConfig::default();
//! let clock = Arc::new(ClockSynchronizer::new(config.clock.clone(), LocalClock::new()));
//! let (scheduler, mut output) = PlaybackScheduler::new(config.scheduler.clone(), clock.clone());
//!
//! scheduler.start().await;
//! scheduler.schedule(vec![0u8; 1920], 1_000_000);
//!
//! while let Some(chunk) = output.recv().await {
//!     // hand chunk.payload to the audio device at chunk.play_time
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! transport -> FrameDecoder -> codec -> PlaybackScheduler -> output channel
//!                                 |             ^
//!                           BufferTracker       | time translation
//!                                         ClockSynchronizer <- ClockSyncDriver
//! ```
//!
//! Codec decoding, audio output, the JSON control protocol and connection
//! management belong to the embedding application.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod clock;
pub mod playback;
pub mod protocol;

// Re-exports
pub use clock::{
    ClockSample, ClockState, ClockSyncDriver, ClockSynchronizer, LocalClock, ServerTimes,
    TimeBase, TimeExchange,
};
pub use error::{Result, SyncError};
pub use playback::{
    BufferTracker, ChunkDecoder, ChunkIngest, IngestOutcome, PcmFormat, PcmPassthrough,
    PlaybackScheduler, ScheduledChunk, SchedulerState, SchedulerStats,
};
pub use protocol::{FrameDecoder, FrameParseError, FrameType, FrameTypeTable, WireFrame};
pub use types::{BufferConfig, ClockSyncConfig, SchedulerConfig, SyncConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        ChunkIngest, ClockSynchronizer, FrameDecoder, LocalClock, PlaybackScheduler,
        ScheduledChunk, SchedulerStats, SyncConfig, SyncError, TimeBase,
    };
}
