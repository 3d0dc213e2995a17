//! In-memory transport driven by a script of device replies.
//!
//! Used by the test-suite and for exercising the protocol without hardware.
//! Reads never block: a read that finds too few bytes returns short, which
//! the frame transport treats as a timeout.

use std::collections::VecDeque;
use std::time::Duration;

use super::interface::{Connector, Transport};
use super::{Result, SerialError};
use crate::config::PortSettings;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    inbound: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    flushes: usize,
    closed: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make bytes available to read right away.
    pub fn push_inbound(&mut self, bytes: &[u8]) -> &mut Self {
        self.inbound.extend(bytes);
        self
    }

    /// Bytes the device sends after the next unanswered write.
    /// An empty reply stands for a write the device ignores.
    pub fn queue_reply(&mut self, bytes: &[u8]) -> &mut Self {
        self.replies.push_back(bytes.to_vec());
        self
    }

    pub fn set_open(&mut self, open: bool) {
        self.closed = !open;
    }

    /// Every write, in order, one entry per call.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// All written bytes, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes.concat()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }
}

impl Transport for ScriptedTransport {
    fn read_bytes(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if self.closed {
            return Err(SerialError::NotConnected);
        }
        let count = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(SerialError::NotConnected);
        }
        self.writes.push(bytes.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.inbound.extend(reply);
        }
        Ok(())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.flushes += 1;
        self.inbound.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

/// Hands out prepared transports, one per `open`.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    transports: VecDeque<ScriptedTransport>,
    opened: usize,
}

impl ScriptedConnector {
    pub fn new(transports: Vec<ScriptedTransport>) -> Self {
        Self {
            transports: transports.into(),
            opened: 0,
        }
    }

    /// A connector whose every open fails.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.opened
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn open(&mut self, settings: &PortSettings) -> Result<Self::Transport> {
        let transport = self
            .transports
            .pop_front()
            .ok_or_else(|| SerialError::ConnectionFailed(format!("{}: no such device", settings.port)))?;
        self.opened += 1;
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_follow_writes_in_order() {
        let mut port = ScriptedTransport::new();
        port.queue_reply(&[1, 2]).queue_reply(&[]).queue_reply(&[3]);

        let mut buf = [0u8; 4];
        port.write_bytes(&[0xAA]).unwrap();
        assert_eq!(port.read_bytes(&mut buf, Duration::ZERO).unwrap(), 2);
        port.write_bytes(&[0xBB]).unwrap();
        assert_eq!(port.read_bytes(&mut buf, Duration::ZERO).unwrap(), 0);
        port.write_bytes(&[0xCC]).unwrap();
        assert_eq!(port.read_bytes(&mut buf[..1], Duration::ZERO).unwrap(), 1);
        assert_eq!(buf[0], 3);
        assert_eq!(port.written_bytes(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_flush_discards_pending_bytes() {
        let mut port = ScriptedTransport::new();
        port.push_inbound(&[1, 2, 3]);
        port.flush_input().unwrap();
        assert_eq!(port.pending_inbound(), 0);
        assert_eq!(port.flush_count(), 1);
    }
}
