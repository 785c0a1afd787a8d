use proptest::prelude::*;

use crate::protocol::frame::{FrameDecoder, FrameParseError, FrameTypeTable};

proptest! {
    #[test]
    fn test_decode_any_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        // Should not panic, return either Ok or Err
        let _ = FrameDecoder::default().decode(&bytes);
    }

    #[test]
    fn test_short_input_always_too_short(bytes in proptest::collection::vec(any::<u8>(), 0..9)) {
        let result = FrameDecoder::default().decode(&bytes);
        prop_assert_eq!(result, Err(FrameParseError::TooShort { needed: 9, have: bytes.len() }));
    }

    #[test]
    fn test_valid_frame_preserves_fields(
        tag in 0u8..=8,
        timestamp in any::<i64>(),
        payload in proptest::collection::vec(any::<u8>(), 0..256)
    ) {
        let mut data = vec![tag];
        data.extend_from_slice(&timestamp.to_be_bytes());
        data.extend_from_slice(&payload);

        let decoder = FrameDecoder::default();
        match decoder.decode(&data) {
            Ok(frame) => {
                prop_assert_eq!(Some(frame.frame_type), FrameTypeTable::default().lookup(tag));
                prop_assert_eq!(frame.timestamp, timestamp);
                prop_assert_eq!(frame.payload.len(), data.len() - FrameDecoder::HEADER_SIZE);
                prop_assert_eq!(&frame.payload[..], &payload[..]);
            }
            Err(e) => prop_assert_eq!(e, FrameParseError::UnknownType(tag)),
        }
    }
}
