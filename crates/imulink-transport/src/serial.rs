//! Plain UART link over a serial device node.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, trace, warn};

use crate::{LinkState, TransportError, TransportLink};

/// The two rates the bridge legs run at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    B9600,
    B115200,
}

impl BaudRate {
    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B115200 => 115_200,
        }
    }
}

/// UART link, 8 data bits / no parity / 1 stop bit.
pub struct SerialLink {
    path: String,
    baud: BaudRate,
    port: Option<Box<dyn SerialPort>>,
    state: LinkState,
}

impl SerialLink {
    pub fn new(path: impl Into<String>, baud: BaudRate) -> Self {
        Self {
            path: path.into(),
            baud,
            port: None,
            state: LinkState::Disconnected,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl TransportLink for SerialLink {
    fn open(&mut self) -> Result<LinkState, TransportError> {
        if self.state == LinkState::Connected {
            return Ok(self.state);
        }
        self.state = LinkState::Connecting;

        // short timeout keeps reads effectively non-blocking; pending
        // bytes are checked explicitly before each read
        let opened = serialport::new(&self.path, self.baud.as_u32())
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(1))
            .open();

        match opened {
            Ok(port) => {
                debug!(path = %self.path, baud = self.baud.as_u32(), "serial link opened");
                self.port = Some(port);
                self.state = LinkState::Connected;
                Ok(self.state)
            }
            Err(e) => {
                self.state = LinkState::Error;
                Err(map_open_error(&self.path, e))
            }
        }
    }

    fn close(&mut self) {
        // dropping the port handle releases the writer and the device node
        // together; repeated close is a no-op
        if self.port.take().is_some() {
            trace!(path = %self.path, "serial link closed");
        }
        self.state = LinkState::Disconnected;
    }

    fn state(&self) -> LinkState {
        self.state
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let pending = port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let want = pending.min(buf.len());
        match port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        if let Err(e) = port.write_all(bytes) {
            warn!(path = %self.path, error = %e, "serial write failed");
            return Err(TransportError::Io(e));
        }
        Ok(())
    }
}

fn map_open_error(path: &str, e: serialport::Error) -> TransportError {
    match e.kind.clone() {
        serialport::ErrorKind::NoDevice => TransportError::NoDevice,
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied {
                device: path.to_string(),
            }
        }
        _ => TransportError::Serial(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_values() {
        assert_eq!(BaudRate::B9600.as_u32(), 9600);
        assert_eq!(BaudRate::B115200.as_u32(), 115_200);
    }

    #[test]
    fn open_missing_device_reports_and_sets_error_state() {
        let mut link = SerialLink::new("/dev/imulink-does-not-exist", BaudRate::B115200);
        assert!(link.open().is_err());
        assert_eq!(link.state(), LinkState::Error);

        // close after failed open is still a no-op
        link.close();
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn reads_and_writes_require_connection() {
        let mut link = SerialLink::new("/dev/null", BaudRate::B9600);
        let mut buf = [0u8; 8];
        assert!(matches!(
            link.read_available(&mut buf),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            link.write_chunk(b"x"),
            Err(TransportError::NotConnected)
        ));
    }
}
