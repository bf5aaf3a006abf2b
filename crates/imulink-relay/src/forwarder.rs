//! Relay poll loop.
//!
//! Single-threaded, cooperative, no blocking calls: every iteration drains
//! whatever bytes the links have pending and moves on. Upstream bytes run
//! through the line assembler for command recognition and CAN dispatch;
//! the reverse direction is a verbatim byte pump with no framing at all.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use imulink_can::{CanAdapter, CanPipeline};
use imulink_protocol::{CompletedLine, LineAssembler, LineFrame, Reply, decode_line};
use imulink_transport::{LinkState, TransportError, TransportLink};

use crate::heartbeat::HeartbeatMonitor;

/// Bytes moved per link per iteration.
const CHUNK_SIZE: usize = 256;

/// Idle pacing between iterations when run as a thread loop.
const POLL_PAUSE: Duration = Duration::from_micros(500);

/// Link variants are picked at connect time from device metadata, so the
/// forwarder holds them behind the capability trait.
pub type DynLink = Box<dyn TransportLink + Send>;

/// CAN pipeline over a backend picked at startup.
pub type DynCanPipeline = CanPipeline<Box<dyn CanAdapter + Send>>;

/// Errors surfaced while bringing the relay up.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// The relay stage: assembles lines from the upstream link, answers
/// commands, echoes raw bytes downstream, re-encodes records onto the CAN
/// bus, and pumps downstream bytes back upstream verbatim.
pub struct RelayForwarder {
    upstream: DynLink,
    downstream: Option<DynLink>,
    can: Option<DynCanPipeline>,
    assembler: LineAssembler,
    heartbeat: HeartbeatMonitor,
}

impl RelayForwarder {
    pub fn new(upstream: DynLink) -> Self {
        Self {
            upstream,
            downstream: None,
            can: None,
            assembler: LineAssembler::new(),
            heartbeat: HeartbeatMonitor::default(),
        }
    }

    /// Attach a second link; every completed non-command line is echoed to
    /// it verbatim, and its own bytes flow back upstream.
    pub fn with_downstream(mut self, link: DynLink) -> Self {
        self.downstream = Some(link);
        self
    }

    /// Attach the CAN pipeline; decoded records are re-encoded per its
    /// layout and the batch reply goes back upstream.
    pub fn with_can(mut self, pipeline: DynCanPipeline) -> Self {
        self.can = Some(pipeline);
        self
    }

    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat = HeartbeatMonitor::new(period);
        self
    }

    /// Open the links. A WebUSB-style upstream gets its one-time connect
    /// notice immediately after opening.
    pub fn start(&mut self) -> Result<(), RelayError> {
        self.upstream.open()?;
        if self.upstream.emits_connect_notice() {
            self.reply_upstream(Reply::WebUsbConnected);
        }
        if let Some(down) = self.downstream.as_mut() {
            down.open()?;
        }
        Ok(())
    }

    /// Close both links. Safe to call twice; an already-closed link is a
    /// no-op.
    pub fn shutdown(&mut self) {
        if let Some(down) = self.downstream.as_mut() {
            down.close();
        }
        self.upstream.close();
        debug!("relay shut down");
    }

    /// One loop iteration: upstream-to-downstream first, then
    /// downstream-to-upstream, then the heartbeat. Each direction moves at
    /// most one chunk, so cross-link reordering cannot occur within an
    /// iteration.
    pub fn poll(&mut self) {
        let mut buf = [0u8; CHUNK_SIZE];

        if self.upstream.state() == LinkState::Connected {
            match self.upstream.read_available(&mut buf) {
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if let Some(line) = self.assembler.push(byte) {
                            self.dispatch(line);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "upstream read failed, dropping link");
                    self.upstream.notify_disconnected();
                }
            }
        }

        if let Some(down) = self.downstream.as_mut()
            && down.state() == LinkState::Connected
        {
            match down.read_available(&mut buf) {
                Ok(n) if n > 0 => {
                    // no line buffering in this direction, byte order is
                    // preserved exactly
                    if let Err(e) = self.upstream.write_chunk(&buf[..n]) {
                        warn!(error = %e, "upstream write failed, bytes dropped");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "downstream read failed, dropping link");
                    down.notify_disconnected();
                }
            }
        }

        if self.heartbeat.due(Instant::now()) && self.upstream.state() == LinkState::Connected {
            self.reply_upstream(Reply::Heartbeat);
        }
    }

    /// Run until the flag flips, then shut the links down.
    pub fn run(&mut self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            self.poll();
            spin_sleep::sleep(POLL_PAUSE);
        }
        self.shutdown();
    }

    fn dispatch(&mut self, line: CompletedLine) {
        let decoded = decode_line(&line.text);

        if decoded == Some(LineFrame::Ping) {
            // consumed locally: no echo, no CAN
            trace!("ping received");
            self.reply_upstream(Reply::Pong);
            return;
        }

        if line.text.is_empty() {
            return;
        }

        if let Some(down) = self.downstream.as_mut() {
            // echo path: every received byte of the line, terminator
            // included, malformed or not
            if let Err(e) = down.write_chunk(&line.raw) {
                warn!(error = %e, "downstream write failed, line dropped");
            }
        }

        if let Some(LineFrame::Data(fields)) = decoded {
            if let Some(can) = self.can.as_mut() {
                let reply = can.relay(&fields);
                self.reply_upstream(reply);
            }
        } else {
            // parse failure: silently dropped, the loop keeps going
            trace!(line = %line.text, "unparseable line dropped");
        }
    }

    fn reply_upstream(&mut self, reply: Reply) {
        if let Err(e) = self.upstream.write_chunk(reply.as_line().as_bytes()) {
            warn!(error = %e, reply = reply.as_line().trim_end(), "reply write failed");
        }
    }
}
