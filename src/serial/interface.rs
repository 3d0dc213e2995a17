use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::{SerialPort, SerialPortType};

use super::{Result, SerialDeviceInfo, SerialError};
use crate::config::PortSettings;

/// Byte-level link to the device.
///
/// All reads and writes on one transport are strictly ordered; nothing here
/// is shared between threads.
pub trait Transport {
    /// Fill `buf` within `timeout`. Returns how many bytes actually arrived;
    /// anything short of `buf.len()` means the deadline passed.
    fn read_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Discard anything already received but not yet read.
    fn flush_input(&mut self) -> Result<()>;

    fn is_open(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_bytes(buf, timeout)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn flush_input(&mut self) -> Result<()> {
        (**self).flush_input()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Opens transports from port settings.
pub trait Connector {
    type Transport: Transport;

    fn open(&mut self, settings: &PortSettings) -> Result<Self::Transport>;
}

/// Transport over an OS serial port
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
}

impl SerialPortTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialPortTransport {
    fn read_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut total_read = 0;

        // Bytes already buffered are always read, even past the deadline.
        while total_read < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.port.set_timeout(remaining)?;

            match self.port.read(&mut buf[total_read..]) {
                Ok(0) => break,
                Ok(bytes_read) => total_read += bytes_read,
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(SerialError::IoError(e)),
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        Ok(total_read)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.bytes_to_read().is_ok()
    }
}

/// Opens real serial ports through `serialport`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Transport = SerialPortTransport;

    fn open(&mut self, settings: &PortSettings) -> Result<Self::Transport> {
        let port = serialport::new(settings.port.as_str(), settings.baud_rate)
            .data_bits(settings.data_bits.into())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| SerialError::ConnectionFailed(format!("{}: {}", settings.port, e)))?;

        Ok(SerialPortTransport::new(port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// Owns the lazily opened transport.
///
/// `ensure_open` is idempotent. The transport is released by `close`, or when
/// the manager is dropped.
pub struct ConnectionManager<C: Connector = SerialConnector> {
    connector: C,
    settings: PortSettings,
    transport: Option<C::Transport>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, settings: PortSettings) -> Self {
        Self {
            connector,
            settings,
            transport: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.transport.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Open the transport unless it already is, and hand it out.
    pub fn ensure_open(&mut self) -> Result<&mut C::Transport> {
        if self.transport.is_none() {
            let transport = self.connector.open(&self.settings)?;
            if !transport.is_open() {
                drop(transport);
                return Err(SerialError::ConnectionFailed(format!(
                    "{}: port does not report open",
                    self.settings.port
                )));
            }

            log::info!("Connected to {} at {} baud", self.settings.port, self.settings.baud_rate);
            self.transport = Some(transport);
        }

        self.transport.as_mut().ok_or(SerialError::NotConnected)
    }

    /// The open transport, without opening one.
    pub fn transport_mut(&mut self) -> Result<&mut C::Transport> {
        self.transport.as_mut().ok_or(SerialError::NotConnected)
    }

    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            log::info!("Disconnecting from {}", self.settings.port);
            drop(transport);
        }
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// List serial ports present on this machine
pub fn available_ports() -> Result<Vec<SerialDeviceInfo>> {
    let ports = serialport::available_ports()?;
    let mut devices = Vec::new();

    for port in ports {
        let device = match port.port_type {
            SerialPortType::UsbPort(usb_info) => SerialDeviceInfo {
                port_name: port.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                serial_number: usb_info.serial_number,
                manufacturer: usb_info.manufacturer,
                product: usb_info.product,
            },
            _ => SerialDeviceInfo {
                port_name: port.port_name,
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        };
        devices.push(device);
    }

    Ok(devices)
}
