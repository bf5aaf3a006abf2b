//! USB device discovery.
//!
//! Devices are selected by a vendor-id allow-list carried as opaque
//! configuration; the interface classes found on the device decide which
//! link variant can drive it.

use rusb::{Device, DeviceDescriptor, GlobalContext, TransferType};
use tracing::trace;

use crate::TransportError;

/// USB interface classes the bridge recognizes.
pub const CLASS_CDC_COMM: u8 = 0x02;
pub const CLASS_CDC_DATA: u8 = 0x0A;
pub const CLASS_HID: u8 = 0x03;
pub const CLASS_VENDOR: u8 = 0xFF;

/// Which link variant a discovered device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbLinkKind {
    Cdc,
    VendorBulk,
    Hid,
}

/// One device matching the allow-list.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: u8,
    pub address: u8,
    pub kind: UsbLinkKind,
}

/// Enumerate devices whose vendor id is on the allow-list, classifying
/// each by the interface classes it exposes.
pub fn scan_devices(allowlist: &[u16]) -> Result<Vec<DiscoveredDevice>, TransportError> {
    let mut found = Vec::new();

    for device in rusb::devices()?.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(_) => continue,
        };
        if !allowlist.contains(&desc.vendor_id()) {
            continue;
        }
        let Some(kind) = classify(&device) else {
            continue;
        };
        trace!(
            vid = format_args!("{:04x}", desc.vendor_id()),
            pid = format_args!("{:04x}", desc.product_id()),
            ?kind,
            "matched USB device"
        );
        found.push(DiscoveredDevice {
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            bus: device.bus_number(),
            address: device.address(),
            kind,
        });
    }

    Ok(found)
}

/// Find the first allow-listed device of the given kind.
pub fn find_device(
    allowlist: &[u16],
    kind: UsbLinkKind,
) -> Result<(Device<GlobalContext>, DeviceDescriptor), TransportError> {
    for device in rusb::devices()?.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(_) => continue,
        };
        if !allowlist.contains(&desc.vendor_id()) {
            continue;
        }
        if classify(&device) == Some(kind) {
            return Ok((device, desc));
        }
    }
    Err(TransportError::NoDevice)
}

fn classify(device: &Device<GlobalContext>) -> Option<UsbLinkKind> {
    let config = device.config_descriptor(0).ok()?;
    let mut classes = Vec::new();
    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            classes.push(desc.class_code());
        }
    }

    if classes.contains(&CLASS_CDC_COMM) && classes.contains(&CLASS_CDC_DATA) {
        Some(UsbLinkKind::Cdc)
    } else if classes.contains(&CLASS_VENDOR) {
        Some(UsbLinkKind::VendorBulk)
    } else if classes.contains(&CLASS_HID) {
        Some(UsbLinkKind::Hid)
    } else {
        None
    }
}

/// Bulk endpoint pair (IN, OUT) of one interface descriptor.
pub(crate) fn find_bulk_endpoints(interface: &rusb::InterfaceDescriptor) -> Option<(u8, u8)> {
    find_endpoints(interface, TransferType::Bulk)
}

/// Interrupt endpoint pair (IN, OUT) of one interface descriptor.
pub(crate) fn find_interrupt_endpoints(interface: &rusb::InterfaceDescriptor) -> Option<(u8, u8)> {
    find_endpoints(interface, TransferType::Interrupt)
}

fn find_endpoints(interface: &rusb::InterfaceDescriptor, kind: TransferType) -> Option<(u8, u8)> {
    let mut endpoint_in = None;
    let mut endpoint_out = None;

    for endpoint in interface.endpoint_descriptors() {
        if endpoint.transfer_type() == kind {
            if endpoint.direction() == rusb::Direction::In {
                endpoint_in = Some(endpoint.address());
            } else {
                endpoint_out = Some(endpoint.address());
            }
        }
    }

    match (endpoint_in, endpoint_out) {
        (Some(in_ep), Some(out_ep)) => Some((in_ep, out_ep)),
        _ => None,
    }
}

/// Map a USB open failure onto the transport taxonomy.
pub(crate) fn map_usb_open_error(e: rusb::Error) -> TransportError {
    match e {
        rusb::Error::Access => TransportError::PermissionDenied {
            device: "usb".to_string(),
        },
        rusb::Error::Busy => TransportError::Busy {
            device: "usb".to_string(),
        },
        rusb::Error::NoDevice | rusb::Error::NotFound => TransportError::NoDevice,
        other => TransportError::Usb(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_matches_nothing() {
        // enumeration may fail outright on boxes without USB access; both
        // outcomes are acceptable, matching a device is not
        if let Ok(found) = scan_devices(&[]) {
            assert!(found.is_empty());
        }
    }
}
