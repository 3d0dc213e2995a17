pub mod crc;
pub mod frame;
pub mod interface;
pub mod protocol;
pub mod retry;
pub mod scripted;
pub mod transport;

pub use crc::{Crc16, EposCrc};
pub use frame::{Frame, FrameEncoder, LinkVariant};
pub use interface::{ConnectionManager, ConnectionState, Connector, SerialConnector, Transport};
pub use protocol::FrameProtocol;
pub use retry::RetryPolicy;
pub use transport::{FrameTransport, Response, Stage};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialDeviceInfo {
    pub port_name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Communication timeout waiting for {0}")]
    Timeout(Stage),

    #[error("Protocol error at {stage}: expected 0x{expected:02X}, got 0x{got:02X}")]
    Protocol { stage: Stage, expected: u8, got: u8 },

    #[error("Response CRC mismatch: calculated 0x{expected:04X}, received 0x{got:04X}")]
    CrcMismatch { expected: u16, got: u16 },

    #[error("Opcode not acknowledged after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<SerialError>,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

impl SerialError {
    /// Whether the opcode handshake may be attempted again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SerialError::Timeout(_) | SerialError::Protocol { .. })
    }
}

pub type Result<T> = std::result::Result<T, SerialError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_handshake_failures_are_retryable() {
        assert!(SerialError::Timeout(Stage::OpcodeAck).is_retryable());
        assert!(SerialError::Protocol { stage: Stage::OpcodeAck, expected: 0x4F, got: 0x46 }.is_retryable());
        assert!(!SerialError::NotConnected.is_retryable());
        assert!(!SerialError::CrcMismatch { expected: 1, got: 2 }.is_retryable());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!SerialError::IoError(io).is_retryable());
    }

    #[test]
    fn test_error_messages_name_the_stage() {
        let err = SerialError::Timeout(Stage::FinalAck);
        assert_eq!(err.to_string(), "Communication timeout waiting for final acknowledgement");

        let err = SerialError::Protocol { stage: Stage::Preamble, expected: 0x90, got: 0x12 };
        assert_eq!(err.to_string(), "Protocol error at preamble: expected 0x90, got 0x12");
    }
}
