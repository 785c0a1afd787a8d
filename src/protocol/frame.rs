//! Binary chunk frames
//!
//! ```text
//! byte 0      : message type tag (uint8)
//! bytes 1-8   : timestamp, signed int64, big-endian, microseconds, server clock
//! bytes 9..N  : payload (opaque, may be empty)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical frame type carried by the tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// Encoded audio chunk
    AudioChunk,
    /// Artwork image for channel 0-3
    Artwork(u8),
    /// Visualizer data
    Visualizer,
}

impl FrameType {
    /// Number of artwork channels
    pub const ARTWORK_CHANNELS: u8 = 4;

    /// Artwork channel index, if this is an artwork frame
    #[must_use]
    pub fn artwork_channel(&self) -> Option<u8> {
        match self {
            Self::Artwork(channel) => Some(*channel),
            _ => None,
        }
    }

    /// Whether this frame carries audio
    #[must_use]
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::AudioChunk)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AudioChunk => write!(f, "audio"),
            Self::Artwork(channel) => write!(f, "artwork[{channel}]"),
            Self::Visualizer => write!(f, "visualizer"),
        }
    }
}

/// Mapping from numeric tags to logical frame types
///
/// Some deployments send audio under a different tag than others, so the
/// mapping is configuration rather than a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTypeTable {
    tags: BTreeMap<u8, FrameType>,
}

impl FrameTypeTable {
    /// Audio tags accepted by default
    pub const DEFAULT_AUDIO_TAGS: [u8; 2] = [0, 1];
    /// Tag of artwork channel 0; channels 1-3 follow consecutively
    pub const ARTWORK_BASE_TAG: u8 = 4;
    /// Visualizer tag
    pub const VISUALIZER_TAG: u8 = 8;

    /// Create an empty table that rejects every tag
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tags: BTreeMap::new(),
        }
    }

    /// Map `tag` to `frame_type`, replacing any previous mapping for the tag
    #[must_use]
    pub fn with(mut self, tag: u8, frame_type: FrameType) -> Self {
        self.tags.insert(tag, frame_type);
        self
    }

    /// Replace the set of tags recognized as audio
    #[must_use]
    pub fn with_audio_tags(mut self, audio_tags: &[u8]) -> Self {
        self.tags.retain(|_, t| !t.is_audio());
        for &tag in audio_tags {
            self.tags.insert(tag, FrameType::AudioChunk);
        }
        self
    }

    /// Look up the frame type for a tag
    #[must_use]
    pub fn lookup(&self, tag: u8) -> Option<FrameType> {
        self.tags.get(&tag).copied()
    }

    /// Lowest tag configured for a frame type
    #[must_use]
    pub fn tag_for(&self, frame_type: FrameType) -> Option<u8> {
        self.tags
            .iter()
            .find_map(|(&tag, &t)| (t == frame_type).then_some(tag))
    }

    /// Number of configured tags
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether no tags are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for FrameTypeTable {
    fn default() -> Self {
        let mut table = Self::empty().with_audio_tags(&Self::DEFAULT_AUDIO_TAGS);
        for channel in 0..FrameType::ARTWORK_CHANNELS {
            table = table.with(Self::ARTWORK_BASE_TAG + channel, FrameType::Artwork(channel));
        }
        table.with(Self::VISUALIZER_TAG, FrameType::Visualizer)
    }
}

/// A decoded wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    /// Logical frame type
    pub frame_type: FrameType,
    /// Timestamp in server clock microseconds
    pub timestamp: i64,
    /// Owned payload, independent of the transport buffer
    pub payload: Bytes,
}

impl WireFrame {
    /// Serialize with an explicit tag byte
    #[must_use]
    pub fn encode_with_tag(&self, tag: u8) -> Bytes {
        let mut buf = BytesMut::with_capacity(FrameDecoder::HEADER_SIZE + self.payload.len());
        buf.put_u8(tag);
        buf.put_i64(self.timestamp);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Errors from frame parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameParseError {
    /// Frame shorter than the fixed header
    #[error("frame too short: need {needed} bytes, have {have}")]
    TooShort {
        /// Minimum bytes needed
        needed: usize,
        /// Bytes actually available
        have: usize,
    },
    /// Tag byte not present in the type table
    #[error("unknown frame type: 0x{0:02X}")]
    UnknownType(u8),
}

/// Stateless decoder for binary frames
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    table: FrameTypeTable,
}

impl FrameDecoder {
    /// Tag byte plus 8-byte timestamp
    pub const HEADER_SIZE: usize = 9;

    /// Create a decoder for the given tag table
    #[must_use]
    pub fn new(table: FrameTypeTable) -> Self {
        Self { table }
    }

    /// The tag table in use
    #[must_use]
    pub fn table(&self) -> &FrameTypeTable {
        &self.table
    }

    /// Decode a frame
    ///
    /// # Errors
    ///
    /// Returns `FrameParseError::TooShort` for inputs under 9 bytes and
    /// `FrameParseError::UnknownType` when the tag is not configured.
    pub fn decode(&self, data: &[u8]) -> Result<WireFrame, FrameParseError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(FrameParseError::TooShort {
                needed: Self::HEADER_SIZE,
                have: data.len(),
            });
        }

        let frame_type = self
            .table
            .lookup(data[0])
            .ok_or(FrameParseError::UnknownType(data[0]))?;
        let timestamp = BigEndian::read_i64(&data[1..Self::HEADER_SIZE]);

        Ok(WireFrame {
            frame_type,
            timestamp,
            payload: Bytes::copy_from_slice(&data[Self::HEADER_SIZE..]),
        })
    }

    /// Encode a frame using the lowest tag configured for its type
    ///
    /// Returns `None` if the table has no tag for the frame type.
    #[must_use]
    pub fn encode(&self, frame: &WireFrame) -> Option<Bytes> {
        let tag = self.table.tag_for(frame.frame_type)?;
        Some(frame.encode_with_tag(tag))
    }
}
