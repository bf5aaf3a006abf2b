//! Subcommand implementations.

pub mod relay;
pub mod scan;
pub mod stream;

pub use relay::RelayCommand;
pub use scan::ScanCommand;
pub use stream::StreamCommand;

use anyhow::{Context, Result};

use imulink_transport::{CdcLink, HidLink, SerialLink, TransportLink, VendorLink};

use crate::config::{LinkConfig, LinkKind};

/// Link variant selected from configuration, behind the capability trait.
pub type DynLink = Box<dyn TransportLink + Send>;

/// Instantiate the configured link variant. Nothing here opens the
/// device; callers decide when to connect.
pub fn build_link(config: &LinkConfig) -> Result<DynLink> {
    let link: DynLink = match config.kind {
        LinkKind::Serial => {
            let port = config
                .port
                .as_ref()
                .context("serial link requires a `port` entry")?;
            Box::new(SerialLink::new(port, config.baud_rate()?))
        }
        LinkKind::Cdc => Box::new(CdcLink::new(
            config.vendor_allowlist.clone(),
            config.baud_rate()?,
        )),
        LinkKind::VendorBulk => Box::new(VendorLink::new(config.vendor_allowlist.clone())),
        LinkKind::Hid => Box::new(HidLink::new(config.vendor_allowlist.clone())),
    };
    Ok(link)
}
