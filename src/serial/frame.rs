use serde::{Deserialize, Serialize};

use super::crc::{Crc16, EposCrc};
use super::{Result, SerialError};

/// Acknowledgement byte of the raw handshake link ("O"kay)
pub const ACK: u8 = b'O';
/// First preamble byte of a framed link, also the stuffing marker
pub const DLE: u8 = 0x90;
/// Second preamble byte of a framed link
pub const STX: u8 = 0x02;
/// Opcode echoed by the device at the start of every response frame
pub const RESPONSE_OPCODE: u8 = 0x00;
/// Largest payload a single length byte can describe
pub const MAX_PAYLOAD_WORDS: usize = u8::MAX as usize + 1;

/// Physical encapsulation of the link. Fixed for the lifetime of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkVariant {
    /// Opcode and body sent separately, each acknowledged by the device
    #[default]
    RawHandshake,
    /// Self-delimiting DLE/STX frame with DLE byte stuffing
    FramedStuffed,
}

impl std::fmt::Display for LinkVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkVariant::RawHandshake => write!(f, "raw handshake"),
            LinkVariant::FramedStuffed => write!(f, "framed/stuffed"),
        }
    }
}

/// An outgoing frame, ready for transmission.
///
/// Built fresh for every send: the node address is already injected and the
/// CRC matches the opcode, length and payload it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: u8,
    length: u8,
    payload: Vec<u16>,
    crc: u16,
}

impl Frame {
    pub fn new<K: Crc16 + ?Sized>(opcode: u8, payload: &[u16], node_id: u8, crc: &K) -> Result<Self> {
        validate_payload(payload)?;

        let mut payload = payload.to_vec();
        inject_node_id(&mut payload, node_id);
        let length = (payload.len() - 1) as u8;
        let crc = crc.checksum(opcode, length, &payload);

        Ok(Self { opcode, length, payload, crc })
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn payload(&self) -> &[u16] {
        &self.payload
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// Length byte, payload words and CRC, each word low byte first.
    /// This is what follows the acknowledged opcode on a raw handshake link.
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + (self.payload.len() + 1) * 2);
        bytes.push(self.length);
        for word in &self.payload {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes.extend_from_slice(&self.crc.to_le_bytes());
        bytes
    }

    /// Complete framed/stuffed wire image: unstuffed preamble, then the
    /// opcode and body with every DLE byte doubled.
    pub fn framed_bytes(&self) -> Vec<u8> {
        let body = self.body_bytes();
        let mut bytes = Vec::with_capacity(3 + body.len() * 2);
        bytes.push(DLE);
        bytes.push(STX);
        stuff_into(&[self.opcode], &mut bytes);
        stuff_into(&body, &mut bytes);
        bytes
    }

    pub fn to_bytes(&self, variant: LinkVariant) -> Vec<u8> {
        match variant {
            LinkVariant::RawHandshake => self.body_bytes(),
            LinkVariant::FramedStuffed => self.framed_bytes(),
        }
    }
}

/// Builds wire images for any opcode and payload.
#[derive(Debug, Clone, Default)]
pub struct FrameEncoder<K = EposCrc> {
    crc: K,
}

impl<K: Crc16> FrameEncoder<K> {
    pub fn new(crc: K) -> Self {
        Self { crc }
    }

    pub fn crc(&self) -> &K {
        &self.crc
    }

    pub fn frame(&self, opcode: u8, payload: &[u16], node_id: u8) -> Result<Frame> {
        Frame::new(opcode, payload, node_id, &self.crc)
    }

    /// Raw handshake: body bytes only (the opcode goes out on its own).
    /// Framed/stuffed: the full stuffed frame.
    pub fn encode(&self, opcode: u8, payload: &[u16], node_id: u8, variant: LinkVariant) -> Result<Vec<u8>> {
        Ok(self.frame(opcode, payload, node_id)?.to_bytes(variant))
    }
}

/// Overwrite the high byte of the second payload word with the node address.
/// The low byte is kept. Payloads shorter than two words are left alone.
pub fn inject_node_id(payload: &mut [u16], node_id: u8) {
    if let Some(word) = payload.get_mut(1) {
        *word = ((node_id as u16) << 8) | (*word & 0x00FF);
    }
}

fn validate_payload(payload: &[u16]) -> Result<()> {
    if payload.is_empty() {
        return Err(SerialError::InvalidFrame("payload must contain at least one word".to_string()));
    }
    if payload.len() > MAX_PAYLOAD_WORDS {
        return Err(SerialError::InvalidFrame(format!(
            "payload of {} words exceeds maximum {}",
            payload.len(),
            MAX_PAYLOAD_WORDS
        )));
    }
    Ok(())
}

fn stuff_into(bytes: &[u8], out: &mut Vec<u8>) {
    for &byte in bytes {
        out.push(byte);
        if byte == DLE {
            out.push(DLE);
        }
    }
}
