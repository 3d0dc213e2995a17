mod common;

use common::{framed_response, transport, SHUTDOWN_PAYLOAD};
use motion_link_lib::serial::frame::{DLE, STX};
use motion_link_lib::serial::scripted::ScriptedTransport;
use motion_link_lib::serial::{LinkVariant, SerialError, Stage};

#[test]
fn test_send_is_one_stuffed_write_without_handshake() {
    let mut port = ScriptedTransport::new();
    let mut link = transport(LinkVariant::FramedStuffed, DLE);

    link.send(&mut port, 0x01, &SHUTDOWN_PAYLOAD).unwrap();

    let expected = link.encoder().encode(0x01, &SHUTDOWN_PAYLOAD, DLE, LinkVariant::FramedStuffed).unwrap();
    assert_eq!(port.writes(), &[expected]);
    assert_eq!(port.flush_count(), 0);
}

#[test]
fn test_exchange_decodes_response() {
    let mut port = ScriptedTransport::new();
    port.queue_reply(&framed_response(&[0x0000, 0x0000, 0x002A, 0x0000]));
    let mut link = transport(LinkVariant::FramedStuffed, 1);

    let response = link.exchange(&mut port, 0x01, &SHUTDOWN_PAYLOAD).unwrap();
    assert_eq!(response.words, vec![0x0000, 0x0000, 0x002A, 0x0000]);
    assert_eq!(response.error_code(), Some(0));
    assert_eq!(port.writes().len(), 1, "no acknowledgements on a framed link");
}

#[test]
fn test_receive_destuffs_payload() {
    let words = [0x9000, 0x0090, 0x9090, 0x0001];
    let wire = framed_response(&words);
    assert!(wire.windows(2).skip(1).any(|pair| pair == [DLE, DLE]));

    let mut port = ScriptedTransport::new();
    port.push_inbound(&wire);
    let mut link = transport(LinkVariant::FramedStuffed, 1);

    let response = link.receive(&mut port).unwrap();
    assert_eq!(response.words, words.to_vec());
    assert_eq!(port.pending_inbound(), 0);
}

#[test]
fn test_preamble_mismatch_fails_immediately() {
    let mut port = ScriptedTransport::new();
    port.push_inbound(&[DLE, 0x03, 0x00]);
    let mut link = transport(LinkVariant::FramedStuffed, 1);

    assert!(matches!(
        link.receive(&mut port),
        Err(SerialError::Protocol { stage: Stage::Preamble, expected: STX, got: 0x03 })
    ));
    assert_eq!(port.flush_count(), 0);
}

#[test]
fn test_non_response_opcode_is_rejected() {
    let mut port = ScriptedTransport::new();
    port.push_inbound(&[DLE, STX, 0x01]);
    let mut link = transport(LinkVariant::FramedStuffed, 1);

    assert!(matches!(
        link.receive(&mut port),
        Err(SerialError::Protocol { stage: Stage::ResponseOpcode, expected: 0x00, got: 0x01 })
    ));
}

#[test]
fn test_silent_device_times_out_at_preamble() {
    let mut port = ScriptedTransport::new();
    let mut link = transport(LinkVariant::FramedStuffed, 1);
    assert!(matches!(link.receive(&mut port), Err(SerialError::Timeout(Stage::Preamble))));
}

#[test]
fn test_corrupted_framed_response_fails_crc() {
    let mut wire = framed_response(&[0x0000, 0x0000, 0x1234]);
    // low byte of the first word, after DLE, STX, opcode and length
    wire[4] ^= 0x01;

    let mut port = ScriptedTransport::new();
    port.push_inbound(&wire);
    let mut link = transport(LinkVariant::FramedStuffed, 1);

    assert!(matches!(link.receive(&mut port), Err(SerialError::CrcMismatch { .. })));
}
