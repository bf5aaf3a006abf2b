//! SocketCAN backend (Linux).
//!
//! The bridge drives its CAN leg at 1 Mbit/s; bitrate is a property of the
//! interface (`ip link set can0 type can bitrate 1000000`), so this adapter
//! only verifies the interface opens and stays non-blocking.

use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame, Socket, StandardId};
use tracing::trace;

use crate::{CanAdapter, CanError};
use imulink_protocol::BusFrame;

/// Adapter over one SocketCAN interface.
pub struct SocketCanAdapter {
    socket: CanSocket,
    interface: String,
}

impl SocketCanAdapter {
    /// Open a SocketCAN interface (e.g. `can0`, `vcan0`) in non-blocking
    /// mode.
    pub fn open(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();
        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(format!("failed to open CAN interface '{interface}': {e}"))
        })?;
        socket.set_nonblocking(true).map_err(CanError::Io)?;
        trace!("CAN interface '{}' opened", interface);
        Ok(Self { socket, interface })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: BusFrame) -> Result<(), CanError> {
        let id = StandardId::new(frame.id).ok_or(CanError::InvalidId {
            id: u32::from(frame.id),
        })?;
        let can_frame = CanFrame::new(id, frame.data_slice()).ok_or_else(|| {
            CanError::SendRejected(format!("payload of {} bytes rejected", frame.len))
        })?;
        self.socket.write_frame(&can_frame).map_err(CanError::Io)
    }

    fn try_receive(&mut self) -> Result<Option<BusFrame>, CanError> {
        match self.socket.read_frame() {
            Ok(frame) => {
                let id = (frame.raw_id() & 0x7FF) as u16;
                Ok(Some(BusFrame::new(id, frame.data())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(CanError::Io(e)),
        }
    }
}
