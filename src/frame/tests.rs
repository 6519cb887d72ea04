//! Unit tests for frame header encoding and decoding.

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use rstest::rstest;

use super::*;

#[test]
fn encode_writes_big_endian_total_length_and_type() {
    let bytes = encode(PacketType::Location, &[0xAA, 0xBB, 0xCC]).expect("encode");
    assert_eq!(&bytes[..], &[0, 0, 0, 8, 3, 0xAA, 0xBB, 0xCC]);
}

#[test]
fn empty_payload_encodes_header_only() {
    let bytes = encode(PacketType::Ping, &[]).expect("encode");
    assert_eq!(bytes.len(), HEADER_LENGTH);
    assert_eq!(read_length_prefix(&bytes), Some(5));
}

#[rstest]
#[case::empty(&[])]
#[case::prefix_only(&[0, 0, 0, 5])]
fn decode_rejects_short_input(#[case] input: &[u8]) {
    let err = decode(input).expect_err("short input must fail");
    assert!(matches!(err, FramingError::MalformedFrame { .. }));
}

#[rstest]
#[case(0, PacketType::Ping)]
#[case(1, PacketType::Normal)]
#[case(2, PacketType::GameStart)]
#[case(3, PacketType::Location)]
#[case(42, PacketType::Other(42))]
fn packet_type_tags_are_stable(#[case] tag: u8, #[case] expected: PacketType) {
    assert_eq!(PacketType::from(tag), expected);
    assert_eq!(expected.as_u8(), tag);
}

#[test]
fn total_length_counts_header() {
    let frame = Frame::new(PacketType::Normal, Bytes::from_static(b"abc"));
    assert_eq!(frame.total_length(), 8);

    let mut dst = BytesMut::new();
    frame.encode_into(&mut dst).expect("encode");
    assert_eq!(dst.len(), frame.total_length());
}

proptest! {
    #[test]
    fn decode_inverts_encode(tag in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 0..512)) {
        let packet_type = PacketType::from(tag);
        let bytes = encode(packet_type, &payload).expect("encode");
        let frame = decode(&bytes).expect("decode");
        prop_assert_eq!(frame.packet_type(), packet_type);
        prop_assert_eq!(&frame.payload()[..], &payload[..]);
    }
}
