use serde::{Deserialize, Serialize};

/// Opcode of an object write
pub const WRITE_OBJECT: u8 = 0x01;

// Object dictionary entries used by the command set
pub const CONTROLWORD: ObjectAddress = ObjectAddress::new(0x6040, 0x00);
pub const MODES_OF_OPERATION: ObjectAddress = ObjectAddress::new(0x6060, 0x00);
pub const TARGET_POSITION: ObjectAddress = ObjectAddress::new(0x607A, 0x00);
pub const TARGET_VELOCITY: ObjectAddress = ObjectAddress::new(0x60FF, 0x00);
pub const HOMING_METHOD: ObjectAddress = ObjectAddress::new(0x6098, 0x00);
pub const CURRENT_SETPOINT: ObjectAddress = ObjectAddress::new(0x2030, 0x00);

/// Index/subindex pair addressing one object on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAddress {
    pub index: u16,
    pub subindex: u8,
}

impl ObjectAddress {
    pub const fn new(index: u16, subindex: u8) -> Self {
        Self { index, subindex }
    }

    /// Payload of a write: index, subindex word (the node address is filled in
    /// by the transport), value low word, value high word.
    pub fn write_payload(&self, value: u32) -> [u16; 4] {
        [
            self.index,
            self.subindex as u16,
            (value & 0xFFFF) as u16,
            (value >> 16) as u16,
        ]
    }
}

/// Controlword values driving the drive state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Controlword {
    DisableVoltage = 0x0000,
    Shutdown = 0x0006,
    SwitchOnAndEnable = 0x000F,
    StartHoming = 0x001F,
    /// Absolute move, start immediately
    StartAbsoluteMove = 0x003F,
    FaultReset = 0x0080,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    ProfilePosition,
    ProfileVelocity,
    Homing,
    Position,
    Velocity,
    Current,
}

impl OperationMode {
    pub fn code(&self) -> i8 {
        match self {
            OperationMode::ProfilePosition => 1,
            OperationMode::ProfileVelocity => 3,
            OperationMode::Homing => 6,
            OperationMode::Position => -1,
            OperationMode::Velocity => -2,
            OperationMode::Current => -3,
        }
    }
}

impl std::str::FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "profile_position" => Ok(OperationMode::ProfilePosition),
            "profile_velocity" => Ok(OperationMode::ProfileVelocity),
            "homing" => Ok(OperationMode::Homing),
            "position" => Ok(OperationMode::Position),
            "velocity" => Ok(OperationMode::Velocity),
            "current" => Ok(OperationMode::Current),
            other => Err(format!("unknown operation mode: {}", other)),
        }
    }
}
