#![allow(dead_code)]

use std::time::Duration;

use motion_link_lib::serial::crc::{Crc16, EposCrc};
use motion_link_lib::serial::frame::{ACK, DLE, RESPONSE_OPCODE, STX};
use motion_link_lib::serial::scripted::ScriptedTransport;
use motion_link_lib::serial::{FrameTransport, LinkVariant, RetryPolicy};

pub const SHUTDOWN_PAYLOAD: [u16; 4] = [0x6040, 0x0100, 0x0006, 0x0000];

pub fn transport(variant: LinkVariant, node_id: u8) -> FrameTransport {
    FrameTransport::new(variant, node_id).with_retry(RetryPolicy::new(5, Duration::ZERO))
}

/// Length, words and CRC of a response frame, unstuffed.
pub fn response_tail(words: &[u16]) -> Vec<u8> {
    let length = (words.len() - 1) as u8;
    let crc = EposCrc.checksum(RESPONSE_OPCODE, length, words);
    let mut bytes = vec![length];
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes
}

/// Complete framed response as it appears on the wire.
pub fn framed_response(words: &[u16]) -> Vec<u8> {
    let mut bytes = vec![DLE, STX];
    for byte in std::iter::once(RESPONSE_OPCODE).chain(response_tail(words)) {
        bytes.push(byte);
        if byte == DLE {
            bytes.push(DLE);
        }
    }
    bytes
}

/// Device side of one successful raw exchange answering with `words`.
pub fn script_raw_exchange(port: &mut ScriptedTransport, words: &[u16]) {
    port.queue_reply(&[ACK]) // opcode
        .queue_reply(&[ACK, RESPONSE_OPCODE]) // body
        .queue_reply(&response_tail(words)) // ack of response opcode
        .queue_reply(&[]); // final ack
}
