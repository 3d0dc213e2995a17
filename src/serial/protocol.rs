use super::crc::{Crc16, EposCrc};
use super::interface::{ConnectionManager, ConnectionState, Connector, SerialConnector};
use super::transport::{FrameTransport, Response};
use super::Result;
use crate::config::{LinkConfig, PortSettings};

/// Frame protocol over a lazily opened connection.
///
/// Every call opens the port first if needed, then runs exactly one exchange.
/// Failures leave the connection as it was; recovering from a dead link means
/// calling `close` and trying again.
pub struct FrameProtocol<C: Connector = SerialConnector, K = EposCrc> {
    connection: ConnectionManager<C>,
    transport: FrameTransport<K>,
}

impl FrameProtocol<SerialConnector, EposCrc> {
    /// Protocol on the serial port named in `config`. Nothing is opened yet.
    pub fn serial(config: &LinkConfig) -> Self {
        Self::new(SerialConnector, config)
    }
}

impl<C: Connector> FrameProtocol<C, EposCrc> {
    pub fn new(connector: C, config: &LinkConfig) -> Self {
        Self {
            connection: ConnectionManager::new(connector, config.serial.clone()),
            transport: FrameTransport::from_config(config),
        }
    }
}

impl<C: Connector, K: Crc16> FrameProtocol<C, K> {
    pub fn with_transport(connector: C, settings: PortSettings, transport: FrameTransport<K>) -> Self {
        Self {
            connection: ConnectionManager::new(connector, settings),
            transport,
        }
    }

    pub fn ensure_open(&mut self) -> Result<()> {
        self.connection.ensure_open()?;
        Ok(())
    }

    pub fn close(&mut self) {
        self.connection.close();
    }

    pub fn is_open(&self) -> bool {
        self.connection.state() == ConnectionState::Open
    }

    /// Send a frame without reading a response.
    pub fn send(&mut self, opcode: u8, payload: &[u16]) -> Result<()> {
        let port = self.connection.ensure_open()?;
        self.transport.send(port, opcode, payload)
    }

    /// Send a frame and read the device's response.
    pub fn request(&mut self, opcode: u8, payload: &[u16]) -> Result<Response> {
        let port = self.connection.ensure_open()?;
        self.transport.exchange(port, opcode, payload)
    }

    pub fn transport(&self) -> &FrameTransport<K> {
        &self.transport
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<C> {
        &mut self.connection
    }
}
