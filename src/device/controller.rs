use super::models::*;
use super::{DeviceError, Result};
use crate::config::LinkConfig;
use crate::serial::crc::{Crc16, EposCrc};
use crate::serial::interface::{Connector, SerialConnector};
use crate::serial::FrameProtocol;

/// Motion commands for one controller node.
///
/// Each command is one or more object writes; a write succeeds when the
/// device answers with a zero error code.
pub struct MotionController<C: Connector = SerialConnector, K = EposCrc> {
    protocol: FrameProtocol<C, K>,
}

impl MotionController<SerialConnector, EposCrc> {
    pub fn serial(config: &LinkConfig) -> Self {
        Self::new(FrameProtocol::serial(config))
    }
}

impl<C: Connector, K: Crc16> MotionController<C, K> {
    pub fn new(protocol: FrameProtocol<C, K>) -> Self {
        Self { protocol }
    }

    /// Write a 32-bit value to an object
    pub fn write_object(&mut self, address: ObjectAddress, value: u32) -> Result<()> {
        let response = self.protocol.request(WRITE_OBJECT, &address.write_payload(value))?;

        let error_code = response.error_code().ok_or_else(|| {
            DeviceError::UnexpectedResponse(format!("{} words, expected an error code", response.words.len()))
        })?;
        if error_code != 0 {
            log::warn!(
                "Write to 0x{:04X}/{} rejected with 0x{:08X}",
                address.index,
                address.subindex,
                error_code
            );
            return Err(DeviceError::DeviceFault(error_code));
        }
        Ok(())
    }

    pub fn set_controlword(&mut self, controlword: Controlword) -> Result<()> {
        self.write_object(CONTROLWORD, controlword as u32)
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.set_controlword(Controlword::Shutdown)
    }

    /// Shutdown, then switch on and enable operation
    pub fn enable(&mut self) -> Result<()> {
        self.set_controlword(Controlword::Shutdown)?;
        self.set_controlword(Controlword::SwitchOnAndEnable)?;
        log::info!("Drive enabled");
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        self.set_controlword(Controlword::DisableVoltage)?;
        log::info!("Drive disabled");
        Ok(())
    }

    pub fn fault_reset(&mut self) -> Result<()> {
        self.set_controlword(Controlword::FaultReset)
    }

    pub fn set_operation_mode(&mut self, mode: OperationMode) -> Result<()> {
        self.write_object(MODES_OF_OPERATION, mode.code() as u8 as u32)
    }

    pub fn start_homing(&mut self, method: i8) -> Result<()> {
        self.set_operation_mode(OperationMode::Homing)?;
        self.write_object(HOMING_METHOD, method as u8 as u32)?;
        self.set_controlword(Controlword::StartHoming)
    }

    pub fn move_to_position(&mut self, position: i32) -> Result<()> {
        self.write_object(TARGET_POSITION, position as u32)?;
        self.set_controlword(Controlword::StartAbsoluteMove)
    }

    pub fn set_target_velocity(&mut self, velocity: i32) -> Result<()> {
        self.write_object(TARGET_VELOCITY, velocity as u32)?;
        self.set_controlword(Controlword::SwitchOnAndEnable)
    }

    pub fn set_current(&mut self, current: i16) -> Result<()> {
        self.write_object(CURRENT_SETPOINT, current as u16 as u32)
    }

    pub fn close(&mut self) {
        self.protocol.close();
    }

    pub fn protocol(&self) -> &FrameProtocol<C, K> {
        &self.protocol
    }

    pub fn protocol_mut(&mut self) -> &mut FrameProtocol<C, K> {
        &mut self.protocol
    }
}
