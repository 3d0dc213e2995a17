mod common;

use common::SHUTDOWN_PAYLOAD;
use motion_link_lib::serial::crc::{Crc16, EposCrc};
use motion_link_lib::serial::frame::{Frame, FrameEncoder, DLE, STX};
use motion_link_lib::serial::LinkVariant;

#[test]
fn test_node_address_lands_in_second_word_high_byte() {
    let payloads: [&[u16]; 3] = [&[0x0000, 0x00FF], &SHUTDOWN_PAYLOAD, &[0x1234, 0xABCD, 0x0001, 0x0002, 0x0003]];
    for payload in payloads {
        for node_id in [0u8, 1, 5, 0x7F, 0x90, 0xFF] {
            let frame = Frame::new(0x01, payload, node_id, &EposCrc).unwrap();
            let word = frame.payload()[1];
            assert_eq!((word >> 8) as u8, node_id);
            assert_eq!(word & 0x00FF, payload[1] & 0x00FF, "low byte must be preserved");
        }
    }
}

#[test]
fn test_write_scenario_raw_body() {
    let encoder = FrameEncoder::<EposCrc>::default();
    let frame = encoder.frame(0x01, &SHUTDOWN_PAYLOAD, 5).unwrap();
    assert_eq!(frame.payload(), &[0x6040, 0x0500, 0x0006, 0x0000]);
    assert_eq!(frame.length(), 3);

    let crc = EposCrc.checksum(0x01, 3, &[0x6040, 0x0500, 0x0006, 0x0000]);
    let [crc_lo, crc_hi] = crc.to_le_bytes();
    let body = encoder.encode(0x01, &SHUTDOWN_PAYLOAD, 5, LinkVariant::RawHandshake).unwrap();
    assert_eq!(body, vec![0x03, 0x40, 0x60, 0x00, 0x05, 0x06, 0x00, 0x00, 0x00, crc_lo, crc_hi]);
}

#[test]
fn test_write_scenario_framed_with_colliding_node() {
    let encoder = FrameEncoder::<EposCrc>::default();
    let bytes = encoder.encode(0x01, &SHUTDOWN_PAYLOAD, DLE, LinkVariant::FramedStuffed).unwrap();

    assert_eq!(&bytes[..2], &[DLE, STX]);
    assert_ne!(bytes[2], DLE, "preamble appears once");
    // opcode, length, index lo/hi, subindex, node id twice
    assert_eq!(&bytes[2..9], &[0x01, 0x03, 0x40, 0x60, 0x00, DLE, DLE]);
    assert_eq!(&bytes[9..13], &[0x06, 0x00, 0x00, 0x00]);
}

#[test]
fn test_stuffed_frame_decodes_back_to_body() {
    let encoder = FrameEncoder::<EposCrc>::default();
    for node_id in 0..=255u8 {
        let raw = encoder.encode(0x01, &SHUTDOWN_PAYLOAD, node_id, LinkVariant::RawHandshake).unwrap();
        let framed = encoder.encode(0x01, &SHUTDOWN_PAYLOAD, node_id, LinkVariant::FramedStuffed).unwrap();

        let mut unstuffed = Vec::new();
        let mut iter = framed[2..].iter();
        while let Some(&byte) = iter.next() {
            if byte == DLE {
                assert_eq!(iter.next(), Some(&DLE), "every DLE after the preamble is doubled");
            }
            unstuffed.push(byte);
        }
        assert_eq!(unstuffed[0], 0x01);
        assert_eq!(&unstuffed[1..], raw.as_slice());
    }
}

#[test]
fn test_crc_is_pure() {
    let payload = [0x607A, 0x0100, 0x1000, 0x0000];
    let frame_a = Frame::new(0x01, &payload, 9, &EposCrc).unwrap();
    let frame_b = Frame::new(0x01, &payload, 9, &EposCrc).unwrap();
    assert_eq!(frame_a.crc(), frame_b.crc());
    assert_eq!(frame_a, frame_b);
}

#[test]
fn test_custom_crc_function_is_used() {
    let sum = |opcode: u8, length: u8, payload: &[u16]| {
        payload.iter().fold(opcode as u16 + length as u16, |acc, w| acc.wrapping_add(*w))
    };
    let encoder = FrameEncoder::new(sum);
    let body = encoder.encode(0x02, &[0x0001, 0x0002], 0, LinkVariant::RawHandshake).unwrap();
    // 0x02 + 1 + 0x0001 + 0x0002
    assert_eq!(&body[body.len() - 2..], &[0x06, 0x00]);
}
