//! `imulink stream` — stream synthetic IMU samples over the configured
//! link, the way the handheld app does with real sensors.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use tracing::info;

use imulink_host::{GeneratorConfig, MockMotionSource, StreamConfig, StreamSession};
use imulink_protocol::encode_sample;

use crate::commands::build_link;
use crate::config::BridgeConfig;

#[derive(Args, Debug)]
pub struct StreamCommand {
    /// Bridge configuration file.
    #[arg(short, long, default_value = "imulink.toml")]
    config: PathBuf,

    /// Stop after this many seconds (default: run until ctrl-c).
    #[arg(long)]
    duration: Option<u64>,

    /// Print a buffer snapshot at this interval.
    #[arg(long, default_value_t = 1000)]
    snapshot_ms: u64,
}

impl StreamCommand {
    pub fn execute(&self) -> Result<()> {
        let config = BridgeConfig::load(&self.config)?;

        let mut link = build_link(&config.upstream)?;
        link.open()?;

        let mut session = StreamSession::start(link, StreamConfig::default())?;
        let mut source =
            MockMotionSource::spawn(session.event_sender(), GeneratorConfig::default())?;

        let shutdown = Arc::new(AtomicBool::new(false));
        {
            let shutdown = Arc::clone(&shutdown);
            ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))?;
        }

        info!("streaming, ctrl-c to stop");
        let started = Instant::now();
        let snapshot_interval = Duration::from_millis(self.snapshot_ms.max(100));
        let mut next_snapshot = Instant::now() + snapshot_interval;

        while !shutdown.load(Ordering::Relaxed) {
            if let Some(limit) = self.duration
                && started.elapsed() >= Duration::from_secs(limit)
            {
                break;
            }
            if Instant::now() >= next_snapshot {
                next_snapshot += snapshot_interval;
                let snapshot = session.snapshot();
                if let Some(latest) = snapshot.last() {
                    info!(
                        buffered = snapshot.len(),
                        latest = encode_sample(latest).trim_end(),
                        "buffer snapshot"
                    );
                }
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        // releases sources first, then the session's link
        source.stop();
        session.stop();
        Ok(())
    }
}
