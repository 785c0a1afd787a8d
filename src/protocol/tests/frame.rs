use bytes::Bytes;

use crate::protocol::frame::*;

fn frame_bytes(tag: u8, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut data = vec![tag];
    data.extend_from_slice(&timestamp.to_be_bytes());
    data.extend_from_slice(payload);
    data
}

#[test]
fn test_decode_audio_chunk() {
    let decoder = FrameDecoder::default();
    let data = frame_bytes(0, 1_234_567, &[0xDE, 0xAD, 0xBE, 0xEF]);

    let frame = decoder.decode(&data).unwrap();

    assert_eq!(frame.frame_type, FrameType::AudioChunk);
    assert_eq!(frame.timestamp, 1_234_567);
    assert_eq!(frame.payload, Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]));
}

#[test]
fn test_decode_header_only_frame() {
    let decoder = FrameDecoder::default();
    let data = frame_bytes(0, 42, &[]);
    assert_eq!(data.len(), FrameDecoder::HEADER_SIZE);

    let frame = decoder.decode(&data).unwrap();

    assert_eq!(frame.timestamp, 42);
    assert!(frame.payload.is_empty());
}

#[test]
fn test_decode_too_short() {
    let decoder = FrameDecoder::default();

    assert_eq!(
        decoder.decode(&[0, 1, 2, 3, 4, 5, 6, 7]),
        Err(FrameParseError::TooShort { needed: 9, have: 8 })
    );
    assert_eq!(
        decoder.decode(&[]),
        Err(FrameParseError::TooShort { needed: 9, have: 0 })
    );
}

#[test]
fn test_decode_unknown_type() {
    let decoder = FrameDecoder::default();
    let data = frame_bytes(0x42, 0, &[1, 2, 3]);

    assert_eq!(decoder.decode(&data), Err(FrameParseError::UnknownType(0x42)));
}

#[test]
fn test_decode_negative_timestamp() {
    let decoder = FrameDecoder::default();
    let data = frame_bytes(0, -5_000, &[]);

    assert_eq!(decoder.decode(&data).unwrap().timestamp, -5_000);
}

#[test]
fn test_timestamp_is_big_endian() {
    let decoder = FrameDecoder::default();
    let data = [0u8, 0, 0, 0, 0, 0, 0, 0x01, 0x00, 0xAA];

    let frame = decoder.decode(&data).unwrap();

    assert_eq!(frame.timestamp, 256);
    assert_eq!(&frame.payload[..], &[0xAA]);
}

#[test]
fn test_default_table_tags() {
    let decoder = FrameDecoder::default();

    for tag in [0u8, 1] {
        let frame = decoder.decode(&frame_bytes(tag, 0, &[])).unwrap();
        assert_eq!(frame.frame_type, FrameType::AudioChunk);
    }
    for channel in 0..4u8 {
        let frame = decoder.decode(&frame_bytes(4 + channel, 0, &[])).unwrap();
        assert_eq!(frame.frame_type, FrameType::Artwork(channel));
        assert_eq!(frame.frame_type.artwork_channel(), Some(channel));
    }
    let frame = decoder.decode(&frame_bytes(8, 0, &[])).unwrap();
    assert_eq!(frame.frame_type, FrameType::Visualizer);

    assert!(decoder.decode(&frame_bytes(2, 0, &[])).is_err());
    assert!(decoder.decode(&frame_bytes(9, 0, &[])).is_err());
}

#[test]
fn test_custom_audio_tags() {
    let table = FrameTypeTable::default().with_audio_tags(&[4]);
    let decoder = FrameDecoder::new(table);

    assert_eq!(
        decoder.decode(&frame_bytes(4, 0, &[])).unwrap().frame_type,
        FrameType::AudioChunk
    );
    assert_eq!(decoder.decode(&frame_bytes(0, 0, &[])), Err(FrameParseError::UnknownType(0)));
    assert_eq!(decoder.decode(&frame_bytes(1, 0, &[])), Err(FrameParseError::UnknownType(1)));
}

#[test]
fn test_empty_table_rejects_everything() {
    let decoder = FrameDecoder::new(FrameTypeTable::empty());

    assert!(decoder.table().is_empty());
    assert_eq!(decoder.decode(&frame_bytes(0, 0, &[])), Err(FrameParseError::UnknownType(0)));
}

#[test]
fn test_payload_outlives_input_buffer() {
    let decoder = FrameDecoder::default();
    let frame = {
        let data = frame_bytes(0, 7, &[9, 8, 7]);
        decoder.decode(&data).unwrap()
    };

    assert_eq!(&frame.payload[..], &[9, 8, 7]);
}

#[test]
fn test_decode_is_pure() {
    let decoder = FrameDecoder::default();
    let data = frame_bytes(8, 99, &[1, 2]);

    assert_eq!(decoder.decode(&data), decoder.decode(&data));
}

#[test]
fn test_encode_uses_lowest_tag() {
    let decoder = FrameDecoder::default();
    let frame = WireFrame {
        frame_type: FrameType::AudioChunk,
        timestamp: 1000,
        payload: Bytes::from_static(&[1, 2, 3]),
    };

    let encoded = decoder.encode(&frame).unwrap();

    assert_eq!(&encoded[..], &frame_bytes(0, 1000, &[1, 2, 3])[..]);
}

#[test]
fn test_encode_unmapped_type() {
    let decoder = FrameDecoder::new(FrameTypeTable::empty().with_audio_tags(&[0]));
    let frame = WireFrame {
        frame_type: FrameType::Visualizer,
        timestamp: 0,
        payload: Bytes::new(),
    };

    assert!(decoder.encode(&frame).is_none());
}

#[test]
fn test_frame_type_display() {
    assert_eq!(FrameType::AudioChunk.to_string(), "audio");
    assert_eq!(FrameType::Artwork(2).to_string(), "artwork[2]");
    assert_eq!(FrameType::Visualizer.to_string(), "visualizer");
}
