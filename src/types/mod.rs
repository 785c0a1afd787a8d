//! Core types module

pub mod config;


pub use config::{BufferConfig, ClockSyncConfig, SchedulerConfig, SyncConfig, SyncConfigBuilder};
