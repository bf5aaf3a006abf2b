//! `imulink relay` — run the forwarding loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use imulink_can::CanPipeline;
use imulink_relay::{DynCanPipeline, RelayForwarder};

use crate::commands::build_link;
use crate::config::{BridgeConfig, CanConfig};

#[derive(Args, Debug)]
pub struct RelayCommand {
    /// Bridge configuration file.
    #[arg(short, long, default_value = "imulink.toml")]
    config: PathBuf,
}

impl RelayCommand {
    pub fn execute(&self) -> Result<()> {
        let config = BridgeConfig::load(&self.config)?;

        let upstream = build_link(&config.upstream)?;
        let mut relay = RelayForwarder::new(upstream)
            .with_heartbeat_period(Duration::from_millis(config.heartbeat_ms));

        if let Some(link_config) = &config.downstream {
            relay = relay.with_downstream(build_link(link_config)?);
        }
        if let Some(can_config) = &config.can {
            relay = relay.with_can(can_pipeline(can_config));
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        {
            let shutdown = Arc::clone(&shutdown);
            ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))?;
        }

        relay.start()?;
        info!("relay running, ctrl-c to stop");
        relay.run(shutdown);
        Ok(())
    }
}

/// Bring the CAN leg up. A failed init is permanent: the relay keeps
/// running and answers every record with `ERR:NO_CAN_INIT`.
#[cfg(target_os = "linux")]
fn can_pipeline(config: &CanConfig) -> DynCanPipeline {
    use imulink_can::{CanAdapter, SocketCanAdapter};

    let layout = config.layout.to_layout();
    match SocketCanAdapter::open(&config.interface) {
        Ok(adapter) => {
            info!(interface = %config.interface, "CAN leg up");
            let boxed: Box<dyn CanAdapter + Send> = Box::new(adapter);
            CanPipeline::new(boxed, layout)
        }
        Err(e) => {
            warn!(interface = %config.interface, error = %e, "CAN init failed, replies will carry ERR:NO_CAN_INIT");
            CanPipeline::uninitialized(layout)
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn can_pipeline(config: &CanConfig) -> DynCanPipeline {
    warn!("SocketCAN is Linux-only, replies will carry ERR:NO_CAN_INIT");
    CanPipeline::uninitialized(config.layout.to_layout())
}
