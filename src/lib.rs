pub mod config;
pub mod device;
pub mod serial;

pub use config::LinkConfig;
pub use device::MotionController;
pub use serial::{FrameProtocol, FrameTransport, LinkVariant, Response, SerialError};
