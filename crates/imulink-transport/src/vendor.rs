//! USB vendor-class bulk link (WebUSB-style).
//!
//! No line coding exists on these interfaces; the device streams raw bytes
//! on a discovered bulk IN/OUT pair. Some firmwares still expect a
//! DTR-equivalent class request before they start talking, so one is sent
//! fire-and-forget at open. The relay announces such links with a one-time
//! connect notice.

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, trace, warn};

use crate::usb::{CLASS_VENDOR, UsbLinkKind, find_bulk_endpoints, find_device, map_usb_open_error};
use crate::{LinkState, TransportError, TransportLink};

/// Vendor-interface class request mirroring CDC's control-line-state.
const VENDOR_REQ_TYPE_OUT: u8 = 0x41;
const VENDOR_SET_READY: u8 = 0x22;

const READ_TIMEOUT: Duration = Duration::from_millis(1);
const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

struct VendorIo {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
    endpoint_in: u8,
    endpoint_out: u8,
}

/// Vendor-class bulk link selected from the vendor-id allow-list.
pub struct VendorLink {
    allowlist: Vec<u16>,
    io: Option<VendorIo>,
    state: LinkState,
}

impl VendorLink {
    pub fn new(allowlist: Vec<u16>) -> Self {
        Self {
            allowlist,
            io: None,
            state: LinkState::Disconnected,
        }
    }

    fn bring_up(&mut self) -> Result<VendorIo, TransportError> {
        let (device, _) = find_device(&self.allowlist, UsbLinkKind::VendorBulk)?;
        let handle = device.open().map_err(map_usb_open_error)?;

        let config = device.config_descriptor(0).map_err(TransportError::Usb)?;
        let mut found = None;
        for interface in config.interfaces() {
            for desc in interface.descriptors() {
                if desc.class_code() == CLASS_VENDOR
                    && let Some(endpoints) = find_bulk_endpoints(&desc)
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

        // DTR-equivalent, best effort: devices that don't implement the
        // request stream anyway
        let _ = handle.write_control(
            VENDOR_REQ_TYPE_OUT,
            VENDOR_SET_READY,
            1,
            u16::from(interface),
            &[],
            Duration::from_millis(100),
        );

        debug!(interface, endpoint_in, endpoint_out, "vendor-bulk link configured");
        Ok(VendorIo {
            handle,
            interface,
            endpoint_in,
            endpoint_out,
        })
    }
}

impl TransportLink for VendorLink {
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
            let _ = io.handle.write_control(
                VENDOR_REQ_TYPE_OUT,
                VENDOR_SET_READY,
                0,
                u16::from(io.interface),
                &[],
                Duration::from_millis(100),
            );
            let _ = io.handle.release_interface(io.interface);
            trace!("vendor-bulk link closed");
        }
        self.state = LinkState::Disconnected;
    }

    fn state(&self) -> LinkState {
        self.state
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(io) = self.io.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        match io.handle.read_bulk(io.endpoint_in, buf, READ_TIMEOUT) {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Ok(0),
            Err(e) => Err(TransportError::Usb(e)),
        }
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(io) = self.io.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        match io.handle.write_bulk(io.endpoint_out, bytes, WRITE_TIMEOUT) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "vendor bulk write failed");
                Err(TransportError::Usb(e))
            }
        }
    }

    fn emits_connect_notice(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announces_connect_notice() {
        let link = VendorLink::new(vec![0x1209]);
        assert!(link.emits_connect_notice());
    }

    #[test]
    fn open_without_matching_device_sets_error_state() {
        let mut link = VendorLink::new(vec![]);
        assert!(link.open().is_err());
        assert_eq!(link.state(), LinkState::Error);
    }
}
