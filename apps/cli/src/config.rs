//! TOML configuration.
//!
//! Everything transport-specific (device paths, vendor allow-lists, baud)
//! is carried here as opaque configuration; the protocol never depends on
//! any of it.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use imulink_protocol::FrameLayout;
use imulink_transport::BaudRate;

/// Which link variant to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    Serial,
    Cdc,
    VendorBulk,
    Hid,
}

/// CAN frame split selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    ThreeFrame,
    FourFrame,
}

impl LayoutKind {
    pub fn to_layout(self) -> FrameLayout {
        match self {
            LayoutKind::ThreeFrame => FrameLayout::three_frame(),
            LayoutKind::FourFrame => FrameLayout::four_frame(),
        }
    }
}

fn default_baud() -> u32 {
    115_200
}

fn default_heartbeat_ms() -> u64 {
    3000
}

fn default_layout() -> LayoutKind {
    LayoutKind::ThreeFrame
}

/// Upstream (or downstream) link description.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub kind: LinkKind,
    /// Device node for serial links.
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// USB vendor ids eligible for selection.
    #[serde(default)]
    pub vendor_allowlist: Vec<u16>,
}

impl LinkConfig {
    pub fn baud_rate(&self) -> Result<BaudRate> {
        match self.baud {
            9600 => Ok(BaudRate::B9600),
            115_200 => Ok(BaudRate::B115200),
            other => bail!("unsupported baud rate {other}, expected 9600 or 115200"),
        }
    }
}

/// CAN leg description.
#[derive(Debug, Clone, Deserialize)]
pub struct CanConfig {
    pub interface: String,
    #[serde(default = "default_layout")]
    pub layout: LayoutKind,
}

/// Full bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub upstream: LinkConfig,
    /// Second link for inter-relay echo hops.
    #[serde(default)]
    pub downstream: Option<LinkConfig>,
    /// CAN leg; absent means pure passthrough.
    #[serde(default)]
    pub can: Option<CanConfig>,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

impl BridgeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_bridge_config() {
        let config: BridgeConfig = toml::from_str(
            r#"
            heartbeat_ms = 1500

            [upstream]
            kind = "serial"
            port = "/dev/ttyACM0"
            baud = 9600

            [downstream]
            kind = "vendor-bulk"
            vendor_allowlist = [0x2E8A]

            [can]
            interface = "can0"
            layout = "four-frame"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.kind, LinkKind::Serial);
        assert_eq!(config.upstream.baud_rate().unwrap(), BaudRate::B9600);
        assert_eq!(config.heartbeat_ms, 1500);
        let can = config.can.unwrap();
        assert_eq!(can.layout, LayoutKind::FourFrame);
        assert_eq!(can.layout.to_layout().entries().len(), 4);
    }

    #[test]
    fn defaults_apply() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [upstream]
            kind = "cdc"
            vendor_allowlist = [4660]
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.baud, 115_200);
        assert_eq!(config.heartbeat_ms, 3000);
        assert!(config.can.is_none());
        assert!(config.downstream.is_none());
    }

    #[test]
    fn rejects_off_menu_baud() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [upstream]
            kind = "serial"
            port = "/dev/ttyACM0"
            baud = 57600
            "#,
        )
        .unwrap();
        assert!(config.upstream.baud_rate().is_err());
    }
}
