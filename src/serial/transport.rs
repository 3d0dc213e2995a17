//! One request/response exchange over an open transport.
//!
//! Raw handshake link:
//!
//! ```text
//! host                         device
//!  opcode            ->
//!                    <-        'O'          (retried, see RetryPolicy)
//!  len, words, crc   ->
//!                    <-        'O'
//!                    <-        0x00         (response opcode)
//!  'O'               ->
//!                    <-        len, words, crc
//!  'O'               ->
//! ```
//!
//! Framed link: one stuffed frame each way, no acknowledgements.

use std::time::Duration;

use super::crc::{Crc16, EposCrc};
use super::frame::{Frame, FrameEncoder, LinkVariant, ACK, DLE, RESPONSE_OPCODE, STX};
use super::interface::Transport;
use super::retry::RetryPolicy;
use super::{Result, SerialError};
use crate::config::{LinkConfig, Verbosity};

/// Negative acknowledgement, sent when a response fails its CRC check
pub const NAK: u8 = b'F';

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Step of the exchange a read belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    OpcodeAck,
    FinalAck,
    Preamble,
    ResponseOpcode,
    ResponseLength,
    ResponseData,
    ResponseCrc,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::OpcodeAck => "opcode acknowledgement",
            Stage::FinalAck => "final acknowledgement",
            Stage::Preamble => "preamble",
            Stage::ResponseOpcode => "response opcode",
            Stage::ResponseLength => "response length",
            Stage::ResponseData => "response data",
            Stage::ResponseCrc => "response CRC",
        };
        f.write_str(name)
    }
}

/// Progress of the current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    OpcodeSent,
    OpcodeAcked,
    BodySent,
    ResponseWait,
    Done,
    Failed,
}

/// A decoded response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub opcode: u8,
    pub length: u8,
    pub words: Vec<u16>,
    pub crc: u16,
}

impl Response {
    /// Device error code carried in the first two words, low word first.
    pub fn error_code(&self) -> Option<u32> {
        match self.words.as_slice() {
            [lo, hi, ..] => Some(((*hi as u32) << 16) | *lo as u32),
            _ => None,
        }
    }

    /// Words following the error code
    pub fn data(&self) -> &[u16] {
        self.words.get(2..).unwrap_or(&[])
    }
}

pub struct FrameTransport<K = EposCrc> {
    encoder: FrameEncoder<K>,
    variant: LinkVariant,
    node_id: u8,
    timeout: Duration,
    retry: RetryPolicy,
    verbosity: Verbosity,
    verify_response_crc: bool,
    state: State,
}

impl FrameTransport<EposCrc> {
    pub fn new(variant: LinkVariant, node_id: u8) -> Self {
        Self::with_crc(EposCrc, variant, node_id)
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.variant, config.node_id)
            .with_timeout(config.timeout())
            .with_retry(config.retry_policy())
            .with_verbosity(config.verbosity)
            .with_response_crc_check(config.verify_response_crc)
    }
}

impl<K: Crc16> FrameTransport<K> {
    pub fn with_crc(crc: K, variant: LinkVariant, node_id: u8) -> Self {
        Self {
            encoder: FrameEncoder::new(crc),
            variant,
            node_id,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            verbosity: Verbosity::Silent,
            verify_response_crc: true,
            state: State::Idle,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_response_crc_check(mut self, enabled: bool) -> Self {
        self.verify_response_crc = enabled;
        self
    }

    pub fn variant(&self) -> LinkVariant {
        self.variant
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn encoder(&self) -> &FrameEncoder<K> {
        &self.encoder
    }

    /// Send one frame and wait for the device to take it.
    pub fn send<P: Transport + ?Sized>(&mut self, port: &mut P, opcode: u8, payload: &[u16]) -> Result<()> {
        self.state = State::Idle;
        let frame = self.encoder.frame(opcode, payload, self.node_id)?;

        let result = match self.variant {
            LinkVariant::RawHandshake => self.send_raw(port, &frame),
            LinkVariant::FramedStuffed => self.send_framed(port, &frame),
        };

        match &result {
            Ok(()) => {
                self.state = State::Done;
                if self.verbosity >= Verbosity::Summary {
                    log::info!(
                        "Sent opcode 0x{:02X} with {} words to node {}",
                        opcode,
                        frame.payload().len(),
                        self.node_id
                    );
                }
            }
            Err(e) => {
                self.state = State::Failed;
                if self.verbosity >= Verbosity::Summary {
                    log::warn!("Sending opcode 0x{:02X} failed: {}", opcode, e);
                }
            }
        }
        result
    }

    /// Read the response frame that follows a successful `send`.
    pub fn receive<P: Transport + ?Sized>(&mut self, port: &mut P) -> Result<Response> {
        self.state = State::ResponseWait;

        let result = match self.variant {
            LinkVariant::RawHandshake => self.receive_raw(port),
            LinkVariant::FramedStuffed => self.receive_framed(port),
        };

        match &result {
            Ok(response) => {
                self.state = State::Done;
                if self.verbosity >= Verbosity::Summary {
                    log::info!("Received response with {} words: {:04X?}", response.words.len(), response.words);
                }
            }
            Err(e) => {
                self.state = State::Failed;
                if self.verbosity >= Verbosity::Summary {
                    log::warn!("Receiving response failed: {}", e);
                }
            }
        }
        result
    }

    pub fn exchange<P: Transport + ?Sized>(&mut self, port: &mut P, opcode: u8, payload: &[u16]) -> Result<Response> {
        self.send(port, opcode, payload)?;
        self.receive(port)
    }

    fn send_raw<P: Transport + ?Sized>(&mut self, port: &mut P, frame: &Frame) -> Result<()> {
        let retry = self.retry;
        retry.run(port, |port, attempt| {
            if attempt > 1 && self.verbosity >= Verbosity::Summary {
                log::info!("Retrying opcode 0x{:02X} (attempt {}/{})", frame.opcode(), attempt, retry.max_attempts);
            }
            self.write(port, &[frame.opcode()])?;
            self.state = State::OpcodeSent;
            let acked = self.expect_byte(port, ACK, Stage::OpcodeAck);
            if let Err(e) = &acked {
                if self.verbosity >= Verbosity::Summary {
                    log::debug!("Handshake attempt {}/{} failed: {}", attempt, retry.max_attempts, e);
                }
            }
            acked
        })?;
        self.state = State::OpcodeAcked;

        self.write(port, &frame.body_bytes())?;
        self.state = State::BodySent;

        self.expect_byte(port, ACK, Stage::FinalAck)
    }

    fn send_framed<P: Transport + ?Sized>(&mut self, port: &mut P, frame: &Frame) -> Result<()> {
        self.write(port, &frame.framed_bytes())?;
        self.state = State::BodySent;
        Ok(())
    }

    fn receive_raw<P: Transport + ?Sized>(&mut self, port: &mut P) -> Result<Response> {
        self.expect_byte(port, RESPONSE_OPCODE, Stage::ResponseOpcode)?;
        self.write(port, &[ACK])?;

        let length = self.read_byte(port, Stage::ResponseLength)?;
        let data = self.read_exact(port, (length as usize + 1) * 2, Stage::ResponseData)?;
        let words: Vec<u16> = data.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
        let crc_bytes = self.read_exact(port, 2, Stage::ResponseCrc)?;
        let crc = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);

        let response = Response { opcode: RESPONSE_OPCODE, length, words, crc };
        if let Err(e) = self.check_crc(&response) {
            self.write(port, &[NAK])?;
            return Err(e);
        }

        self.write(port, &[ACK])?;
        Ok(response)
    }

    fn receive_framed<P: Transport + ?Sized>(&mut self, port: &mut P) -> Result<Response> {
        // The preamble is never stuffed.
        self.expect_byte(port, DLE, Stage::Preamble)?;
        self.expect_byte(port, STX, Stage::Preamble)?;

        let opcode = self.read_stuffed(port, Stage::ResponseOpcode)?;
        if opcode != RESPONSE_OPCODE {
            return Err(SerialError::Protocol {
                stage: Stage::ResponseOpcode,
                expected: RESPONSE_OPCODE,
                got: opcode,
            });
        }

        let length = self.read_stuffed(port, Stage::ResponseLength)?;
        let mut words = Vec::with_capacity(length as usize + 1);
        for _ in 0..=length {
            words.push(self.read_stuffed_word(port, Stage::ResponseData)?);
        }
        let crc = self.read_stuffed_word(port, Stage::ResponseCrc)?;

        let response = Response { opcode, length, words, crc };
        self.check_crc(&response)?;
        Ok(response)
    }

    fn check_crc(&self, response: &Response) -> Result<()> {
        if !self.verify_response_crc {
            return Ok(());
        }
        let expected = self.encoder.crc().checksum(response.opcode, response.length, &response.words);
        if expected != response.crc {
            return Err(SerialError::CrcMismatch { expected, got: response.crc });
        }
        Ok(())
    }

    /// Read one data byte from a stuffed stream: a doubled DLE is a single DLE.
    fn read_stuffed<P: Transport + ?Sized>(&self, port: &mut P, stage: Stage) -> Result<u8> {
        let byte = self.read_byte(port, stage)?;
        if byte == DLE {
            let escaped = self.read_byte(port, stage)?;
            if escaped != DLE {
                return Err(SerialError::Protocol { stage, expected: DLE, got: escaped });
            }
        }
        Ok(byte)
    }

    fn read_stuffed_word<P: Transport + ?Sized>(&self, port: &mut P, stage: Stage) -> Result<u16> {
        let lo = self.read_stuffed(port, stage)?;
        let hi = self.read_stuffed(port, stage)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn expect_byte<P: Transport + ?Sized>(&self, port: &mut P, expected: u8, stage: Stage) -> Result<()> {
        let got = self.read_byte(port, stage)?;
        if got != expected {
            return Err(SerialError::Protocol { stage, expected, got });
        }
        Ok(())
    }

    fn read_byte<P: Transport + ?Sized>(&self, port: &mut P, stage: Stage) -> Result<u8> {
        let bytes = self.read_exact(port, 1, stage)?;
        Ok(bytes[0])
    }

    fn read_exact<P: Transport + ?Sized>(&self, port: &mut P, count: usize, stage: Stage) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; count];
        let bytes_read = port.read_bytes(&mut buffer, self.timeout)?;
        if bytes_read < count {
            if self.verbosity >= Verbosity::Trace {
                log::debug!("rx timeout after {} of {} bytes ({})", bytes_read, count, stage);
            }
            return Err(SerialError::Timeout(stage));
        }
        if self.verbosity >= Verbosity::Trace {
            log::debug!("rx [{}]", hex::encode_upper(&buffer));
        }
        Ok(buffer)
    }

    fn write<P: Transport + ?Sized>(&self, port: &mut P, bytes: &[u8]) -> Result<()> {
        if self.verbosity >= Verbosity::Trace {
            log::debug!("tx [{}]", hex::encode_upper(bytes));
        }
        port.write_bytes(bytes)
    }
}
