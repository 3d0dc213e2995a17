pub mod controller;
pub mod models;

pub use controller::MotionController;
pub use models::*;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Serial communication error: {0}")]
    SerialError(#[from] crate::serial::SerialError),

    #[error("Device reported error 0x{0:08X}")]
    DeviceFault(u32),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
