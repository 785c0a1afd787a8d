//! Clock synchronization between the streaming server and this client
//!
//! ## Time Domains
//!
//! - **Server**: microseconds on the streaming server's monotonic clock.
//!   Chunk timestamps arrive in this domain.
//! - **Local process-relative**: microseconds since the [`LocalClock`] was
//!   created. Client timestamps of a clock exchange use this domain.
//! - **Local absolute**: the process-relative value shifted by the clock's
//!   wall-clock anchor. Play times are expressed here.
//!
//! [`ClockSynchronizer`] anchors the server timeline to the absolute local
//! domain: `local = origin_absolute + server`, where
//! `origin_absolute = start_absolute - offset`.

pub mod driver;
pub mod local;
pub mod sync;


pub use driver::{ClockSyncDriver, ServerTimes, TimeExchange};
pub use local::LocalClock;
pub use sync::{ClockSample, ClockState, ClockSynchronizer, TimeBase};
