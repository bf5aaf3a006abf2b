//! `imulink scan` — enumerate candidate USB devices.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use imulink_transport::scan_devices;

use crate::config::BridgeConfig;

#[derive(Args, Debug)]
pub struct ScanCommand {
    /// Vendor ids to match (hex like 0x2E8A or decimal). Overrides the
    /// config allow-list.
    #[arg(long, value_parser = parse_vendor_id)]
    vendor: Vec<u16>,

    /// Bridge configuration file supplying the allow-list when --vendor is
    /// not given.
    #[arg(short, long, default_value = "imulink.toml")]
    config: PathBuf,
}

impl ScanCommand {
    pub fn execute(&self) -> Result<()> {
        let allowlist = if self.vendor.is_empty() {
            let config = BridgeConfig::load(&self.config)?;
            let mut ids = config.upstream.vendor_allowlist;
            if let Some(down) = config.downstream {
                ids.extend(down.vendor_allowlist);
            }
            ids
        } else {
            self.vendor.clone()
        };

        let devices = scan_devices(&allowlist)?;
        if devices.is_empty() {
            println!("no matching devices");
            return Ok(());
        }
        for device in devices {
            println!(
                "{:04x}:{:04x}  bus {:03} addr {:03}  {:?}",
                device.vendor_id, device.product_id, device.bus, device.address, device.kind
            );
        }
        Ok(())
    }
}

fn parse_vendor_id(value: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    parsed.map_err(|_| format!("invalid vendor id: {value}"))
}
