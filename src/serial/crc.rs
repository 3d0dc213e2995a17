//! Frame checksum.
//!
//! The checksum covers the opcode, the length byte and the payload words.
//! The preamble of a framed link and any stuffing bytes are never part of it.

const CCITT_POLYNOMIAL: u16 = 0x1021;

/// Pluggable 16-bit frame checksum.
///
/// Implementations must be pure: identical inputs always give identical output.
pub trait Crc16 {
    fn checksum(&self, opcode: u8, length: u8, payload: &[u16]) -> u16;
}

impl<F> Crc16 for F
where
    F: Fn(u8, u8, &[u16]) -> u16,
{
    fn checksum(&self, opcode: u8, length: u8, payload: &[u16]) -> u16 {
        self(opcode, length, payload)
    }
}

/// CRC-16/CCITT (poly 0x1021, init 0x0000) over the words
/// `[(opcode << 8) | length, payload..., 0x0000]`, each word high byte first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EposCrc;

impl Crc16 for EposCrc {
    fn checksum(&self, opcode: u8, length: u8, payload: &[u16]) -> u16 {
        let mut crc = 0u16;
        crc = ccitt_update(crc, opcode);
        crc = ccitt_update(crc, length);
        for word in payload {
            let [hi, lo] = word.to_be_bytes();
            crc = ccitt_update(crc, hi);
            crc = ccitt_update(crc, lo);
        }
        crc = ccitt_update(crc, 0);
        ccitt_update(crc, 0)
    }
}

/// Plain CRC-16/CCITT-XMODEM over a byte slice.
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| ccitt_update(crc, byte))
}

fn ccitt_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= (byte as u16) << 8;
    for _ in 0..8 {
        if crc & 0x8000 != 0 {
            crc = (crc << 1) ^ CCITT_POLYNOMIAL;
        } else {
            crc <<= 1;
        }
    }
    crc
}
