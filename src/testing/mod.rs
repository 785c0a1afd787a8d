//! Testing utilities

pub mod time_server;

pub use time_server::SimulatedTimeServer;
