//! # imulink CAN layer
//!
//! Adapter abstraction over the CAN leg of the bridge plus the
//! layout-driven re-encoder that turns decoded telemetry records into bus
//! frames.
//!
//! The relay only ever talks to [`CanAdapter`]; whether frames land on a
//! SocketCAN interface or an in-memory mock is decided at construction
//! time.

use imulink_protocol::BusFrame;
use thiserror::Error;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

pub mod mock;
pub mod pipeline;

pub use mock::{MockCanAdapter, SentFrames};
pub use pipeline::CanPipeline;

/// Unified CAN adapter error type.
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device error: {0}")]
    Device(String),

    #[error("invalid CAN id 0x{id:X}")]
    InvalidId { id: u32 },

    #[error("send rejected: {0}")]
    SendRejected(String),
}

/// Duplex CAN endpoint.
///
/// `send` is expected to complete or fail promptly; `try_receive` never
/// blocks and returns `None` when the bus has nothing pending.
pub trait CanAdapter {
    fn send(&mut self, frame: BusFrame) -> Result<(), CanError>;
    fn try_receive(&mut self) -> Result<Option<BusFrame>, CanError>;
}

impl CanAdapter for Box<dyn CanAdapter + Send> {
    fn send(&mut self, frame: BusFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn try_receive(&mut self) -> Result<Option<BusFrame>, CanError> {
        (**self).try_receive()
    }
}
