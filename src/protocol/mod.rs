//! Wire protocol for the chunk transport
//!
//! Only the binary frame layer lives here. The JSON handshake and control
//! messages are handled by the embedding application.

pub mod frame;


pub use frame::{FrameDecoder, FrameParseError, FrameType, FrameTypeTable, WireFrame};
