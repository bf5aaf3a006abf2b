//! USB-CDC (serial-over-USB) link.
//!
//! Beyond the bulk endpoint pair, CDC requires two class control transfers
//! before data flows: SET_LINE_CODING (baud, framing) and
//! SET_CONTROL_LINE_STATE (DTR/RTS assertion). Both target the
//! communications interface; the data moves on the data interface.

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, trace, warn};

use crate::serial::BaudRate;
use crate::usb::{
    CLASS_CDC_COMM, CLASS_CDC_DATA, UsbLinkKind, find_bulk_endpoints, find_device,
    map_usb_open_error,
};
use crate::{LinkState, TransportError, TransportLink};

/// CDC class requests (host to device, class, interface recipient).
const CDC_REQ_TYPE_OUT: u8 = 0x21;
const CDC_SET_LINE_CODING: u8 = 0x20;
const CDC_SET_CONTROL_LINE_STATE: u8 = 0x22;

/// Control-line-state bits.
const CONTROL_LINE_DTR: u16 = 0x01;
const CONTROL_LINE_RTS: u16 = 0x02;

const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);
const READ_TIMEOUT: Duration = Duration::from_millis(1);
const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Line coding payload: 4-byte LE baud, 1 stop bit, no parity, 8 data
/// bits.
fn line_coding(baud: u32) -> [u8; 7] {
    let mut buf = [0u8; 7];
    buf[0..4].copy_from_slice(&baud.to_le_bytes());
    buf[4] = 0; // bCharFormat: 1 stop bit
    buf[5] = 0; // bParityType: none
    buf[6] = 8; // bDataBits
    buf
}

struct CdcIo {
    handle: DeviceHandle<GlobalContext>,
    comm_interface: u8,
    data_interface: u8,
    endpoint_in: u8,
    endpoint_out: u8,
}

/// CDC link selected from the vendor-id allow-list at open time.
pub struct CdcLink {
    allowlist: Vec<u16>,
    baud: BaudRate,
    io: Option<CdcIo>,
    state: LinkState,
}

impl CdcLink {
    pub fn new(allowlist: Vec<u16>, baud: BaudRate) -> Self {
        Self {
            allowlist,
            baud,
            io: None,
            state: LinkState::Disconnected,
        }
    }

    fn bring_up(&mut self) -> Result<CdcIo, TransportError> {
        let (device, _) = find_device(&self.allowlist, UsbLinkKind::Cdc)?;
        let handle = device.open().map_err(map_usb_open_error)?;

        // locate the comm interface (control transfers) and the data
        // interface (bulk endpoints)
        let config = device.config_descriptor(0).map_err(TransportError::Usb)?;
        let mut comm_interface = None;
        let mut data = None;
        for interface in config.interfaces() {
            for desc in interface.descriptors() {
                match desc.class_code() {
                    CLASS_CDC_COMM => comm_interface = Some(desc.interface_number()),
                    CLASS_CDC_DATA => {
                        if let Some(endpoints) = find_bulk_endpoints(&desc) {
                            data = Some((desc.interface_number(), endpoints));
                        }
                    }
                    _ => {}
                }
            }
        }
        let (comm_interface, (data_interface, (endpoint_in, endpoint_out))) =
            match (comm_interface, data) {
                (Some(c), Some(d)) => (c, d),
                _ => return Err(TransportError::NoDevice),
            };

        for iface in [comm_interface, data_interface] {
            #[cfg(any(target_os = "linux", target_os = "macos"))]
            if handle.kernel_driver_active(iface).unwrap_or(false) {
                handle
                    .detach_kernel_driver(iface)
                    .map_err(map_usb_open_error)?;
            }
            handle.claim_interface(iface).map_err(map_usb_open_error)?;
        }

        // line coding first, then raise DTR/RTS to tell the device the
        // host is listening
        handle
            .write_control(
                CDC_REQ_TYPE_OUT,
                CDC_SET_LINE_CODING,
                0,
                u16::from(comm_interface),
                &line_coding(self.baud.as_u32()),
                CONTROL_TIMEOUT,
            )
            .map_err(TransportError::Usb)?;
        handle
            .write_control(
                CDC_REQ_TYPE_OUT,
                CDC_SET_CONTROL_LINE_STATE,
                CONTROL_LINE_DTR | CONTROL_LINE_RTS,
                u16::from(comm_interface),
                &[],
                CONTROL_TIMEOUT,
            )
            .map_err(TransportError::Usb)?;

        debug!(
            baud = self.baud.as_u32(),
            comm_interface, data_interface, "CDC link configured"
        );
        Ok(CdcIo {
            handle,
            comm_interface,
            data_interface,
            endpoint_in,
            endpoint_out,
        })
    }
}

impl TransportLink for CdcLink {
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
            // drop DTR/RTS so the device stops streaming, then release the
            // interfaces before the handle itself goes away
            let _ = io.handle.write_control(
                CDC_REQ_TYPE_OUT,
                CDC_SET_CONTROL_LINE_STATE,
                0,
                u16::from(io.comm_interface),
                &[],
                CONTROL_TIMEOUT,
            );
            let _ = io.handle.release_interface(io.data_interface);
            let _ = io.handle.release_interface(io.comm_interface);
            trace!("CDC link closed");
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
                warn!(error = %e, "CDC bulk write failed");
                Err(TransportError::Usb(e))
            }
        }
    }
}
