//! # imulink Transport layer
//!
//! One capability-set interface over every duplex byte channel the bridge
//! crosses: plain UART, USB-CDC, USB vendor-class bulk, and USB-HID
//! reports. The relay and the host never branch on transport kind; they
//! poll `read_available` and fire `write_chunk`, and the per-kind
//! mechanics stay inside the backend modules.
//!
//! ## Link lifecycle
//!
//! ```text
//! Disconnected --open ok--> Connected --close / device removed--> Disconnected
//! Disconnected --open fail--> Error --retry (open)--> Connecting --...
//! ```
//!
//! Close and device-removal notifications are idempotent: tearing down an
//! already-disconnected link is a no-op, never an error.

use thiserror::Error;

pub mod cdc;
pub mod hid;
pub mod mock;
pub mod serial;
pub mod usb;
pub mod vendor;

pub use cdc::CdcLink;
pub use hid::HidLink;
pub use mock::{MockLink, mock_pair};
pub use serial::{BaudRate, SerialLink};
pub use usb::{DiscoveredDevice, UsbLinkKind, scan_devices};
pub use vendor::VendorLink;

/// Connection state of one link. Mutated only by that link's own
/// open/close/error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Transport-layer errors.
///
/// Open errors surface to the caller and leave the link in `Error`; no
/// retry is attempted automatically. Write errors are the caller's cue to
/// log and drop the in-flight payload, never to stall.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("permission denied opening {device}")]
    PermissionDenied { device: String },

    #[error("device busy: {device}")]
    Busy { device: String },

    #[error("no matching device")]
    NoDevice,

    #[error("link is not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Capability set shared by every link variant.
///
/// `read_available` never blocks and may return 0; `write_chunk` either
/// queues the bytes with the underlying driver or fails the whole chunk.
pub trait TransportLink {
    /// Bring the link up. On success the state is `Connected`; on failure
    /// the error is returned and the state is `Error` until a retry.
    fn open(&mut self) -> Result<LinkState, TransportError>;

    /// Tear the link down, releasing the outbound writer/endpoint before
    /// the device handle. Safe to call twice.
    fn close(&mut self);

    fn state(&self) -> LinkState;

    /// Non-blocking read of whatever the link has pending, up to
    /// `buf.len()` bytes.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write one chunk. Completion is fire-and-forget from the caller's
    /// point of view.
    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Asynchronous device-removed notification. Idempotent.
    fn notify_disconnected(&mut self) {
        self.close();
    }

    /// Whether this link announces itself with a one-time connect notice
    /// after opening (the WebUSB-style vendor-bulk links do).
    fn emits_connect_notice(&self) -> bool {
        false
    }
}

impl TransportLink for Box<dyn TransportLink + Send> {
    fn open(&mut self) -> Result<LinkState, TransportError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> LinkState {
        (**self).state()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read_available(buf)
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_chunk(bytes)
    }

    fn notify_disconnected(&mut self) {
        (**self).notify_disconnected()
    }

    fn emits_connect_notice(&self) -> bool {
        (**self).emits_connect_notice()
    }
}
