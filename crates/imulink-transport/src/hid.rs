//! USB-HID generic-report link.
//!
//! The device repurposes 64-byte HID reports as a byte pipe: outgoing
//! payloads are zero-padded to the report size, incoming payloads end at
//! the first zero byte. Reports move on interrupt endpoints.

use std::collections::VecDeque;
use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, trace, warn};

use crate::usb::{CLASS_HID, UsbLinkKind, find_device, find_interrupt_endpoints, map_usb_open_error};
use crate::{LinkState, TransportError, TransportLink};

/// Fixed generic-report size.
pub const REPORT_SIZE: usize = 64;

const READ_TIMEOUT: Duration = Duration::from_millis(1);
const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

struct HidIo {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
    endpoint_in: u8,
    endpoint_out: u8,
}

/// HID link selected from the vendor-id allow-list.
pub struct HidLink {
    allowlist: Vec<u16>,
    io: Option<HidIo>,
    state: LinkState,
    /// Payload bytes decoded from reports but not yet handed to the
    /// caller's buffer.
    pending: VecDeque<u8>,
}

impl HidLink {
    pub fn new(allowlist: Vec<u16>) -> Self {
        Self {
            allowlist,
            io: None,
            state: LinkState::Disconnected,
            pending: VecDeque::new(),
        }
    }

    fn bring_up(&mut self) -> Result<HidIo, TransportError> {
        let (device, _) = find_device(&self.allowlist, UsbLinkKind::Hid)?;
        let handle = device.open().map_err(map_usb_open_error)?;

        let config = device.config_descriptor(0).map_err(TransportError::Usb)?;
        let mut found = None;
        for interface in config.interfaces() {
            for desc in interface.descriptors() {
                if desc.class_code() == CLASS_HID
                    && let Some(endpoints) = find_interrupt_endpoints(&desc)
                {
                    found = Some((desc.interface_number(), endpoints));
                }
            }
        }
        let Some((interface, (endpoint_in, endpoint_out))) = found else {
            return Err(TransportError::NoDevice);
        };

        #[cfg(any(target_os = "linux", target_os = "macos"))]
        if handle.kernel_driver_active(interface).unwrap_or(false) {
            handle
                .detach_kernel_driver(interface)
                .map_err(map_usb_open_error)?;
        }
        handle.claim_interface(interface).map_err(map_usb_open_error)?;

        debug!(interface, endpoint_in, endpoint_out, "HID link configured");
        Ok(HidIo {
            handle,
            interface,
            endpoint_in,
            endpoint_out,
        })
    }
}

/// Split a payload out of one 64-byte report: everything up to the first
/// zero byte.
pub(crate) fn report_payload(report: &[u8]) -> &[u8] {
    let end = report.iter().position(|&b| b == 0).unwrap_or(report.len());
    &report[..end]
}

impl TransportLink for HidLink {
    fn open(&mut self) -> Result<LinkState, TransportError> {
        if self.state == LinkState::Connected {
            return Ok(self.state);
        }
        self.state = LinkState::Connecting;
        match self.bring_up() {
            Ok(io) => {
                self.io = Some(io);
                self.state = LinkState::Connected;
                Ok(self.state)
            }
            Err(e) => {
                self.state = LinkState::Error;
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        if let Some(io) = self.io.take() {
            let _ = io.handle.release_interface(io.interface);
            trace!("HID link closed");
        }
        self.pending.clear();
        self.state = LinkState::Disconnected;
    }

    fn state(&self) -> LinkState {
        self.state
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(io) = self.io.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        // top up from at most one report per poll; leftovers wait in
        // `pending` so short caller buffers lose nothing
        if self.pending.is_empty() {
            let mut report = [0u8; REPORT_SIZE];
            match io.handle.read_interrupt(io.endpoint_in, &mut report, READ_TIMEOUT) {
                Ok(n) => self.pending.extend(report_payload(&report[..n])),
                Err(rusb::Error::Timeout) => {}
                Err(e) => return Err(TransportError::Usb(e)),
            }
        }

        let mut copied = 0;
        while copied < buf.len() {
            match self.pending.pop_front() {
                Some(b) => {
                    buf[copied] = b;
                    copied += 1;
                }
                None => break,
            }
        }
        Ok(copied)
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(io) = self.io.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        // a zero byte terminates the payload inside a report, so each
        // report carries at most REPORT_SIZE - 1 useful bytes
        for chunk in bytes.chunks(REPORT_SIZE - 1) {
            let mut report = [0u8; REPORT_SIZE];
            report[..chunk.len()].copy_from_slice(chunk);
            if let Err(e) = io
                .handle
                .write_interrupt(io.endpoint_out, &report, WRITE_TIMEOUT)
            {
                warn!(error = %e, "HID report write failed");
                return Err(TransportError::Usb(e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_ends_at_first_zero() {
        let mut report = [0u8; REPORT_SIZE];
        report[..5].copy_from_slice(b"ping\n");
        assert_eq!(report_payload(&report), b"ping\n");
    }

    #[test]
    fn full_report_has_no_terminator() {
        let report = [b'x'; REPORT_SIZE];
        assert_eq!(report_payload(&report).len(), REPORT_SIZE);
    }

    #[test]
    fn open_without_matching_device_sets_error_state() {
        let mut link = HidLink::new(vec![]);
        assert!(link.open().is_err());
        assert_eq!(link.state(), LinkState::Error);
    }
}
