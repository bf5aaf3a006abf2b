//! Streaming session.
//!
//! The session value is the connection: it owns the outbound link, the
//! single-consumer event queue, and the coalescing worker. Starting a
//! stream acquires everything; stopping releases everything
//! unconditionally, also on error paths, and is safe to call twice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use tracing::{debug, warn};

use imulink_protocol::{PartialSample, Sample, encode_sample};
use imulink_transport::TransportLink;

use crate::coalescer::{COALESCE_WINDOW_MS, SampleCoalescer};

/// Outbound link variant picked at connect time.
pub type HostLink = Box<dyn TransportLink + Send>;

/// Session tuning.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Depth of the bounded observation queue. Producers drop on overflow
    /// rather than block.
    pub queue_depth: usize,
    /// How often the worker checks for a closed window to flush.
    pub flush_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            flush_interval: Duration::from_millis(COALESCE_WINDOW_MS),
        }
    }
}

/// Producer handle onto the session's event queue.
///
/// Both sensor sources push through clones of this; neither ever blocks.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<PartialSample>,
}

impl EventSender {
    /// Queue one observation. A full queue drops the observation with a
    /// warning; sampling cadence is never delayed by the consumer.
    pub fn push(&self, partial: PartialSample) {
        if self.tx.try_send(partial).is_err() {
            warn!("observation queue full, partial sample dropped");
        }
    }
}

/// Errors surfaced while starting a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn stream worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A running stream: event queue in, coalesced records out over the link.
pub struct StreamSession {
    stop: Arc<AtomicBool>,
    events_tx: Sender<PartialSample>,
    coalescer: Arc<Mutex<SampleCoalescer>>,
    worker: Option<JoinHandle<()>>,
}

impl StreamSession {
    /// Take ownership of an opened link and start the coalescing worker.
    pub fn start(link: HostLink, config: StreamConfig) -> Result<Self, SessionError> {
        let (events_tx, events_rx) = bounded(config.queue_depth);
        let stop = Arc::new(AtomicBool::new(false));
        let coalescer = Arc::new(Mutex::new(SampleCoalescer::new()));

        let worker = std::thread::Builder::new()
            .name("imulink-stream".into())
            .spawn({
                let stop = Arc::clone(&stop);
                let coalescer = Arc::clone(&coalescer);
                let flush_interval = config.flush_interval;
                move || worker_loop(link, events_rx, coalescer, stop, flush_interval)
            })?;

        debug!("stream session started");
        Ok(Self {
            stop,
            events_tx,
            coalescer,
            worker: Some(worker),
        })
    }

    /// Handle for pushing observations; clone one per source. Pushes after
    /// `stop` go nowhere.
    pub fn event_sender(&self) -> EventSender {
        EventSender {
            tx: self.events_tx.clone(),
        }
    }

    /// Read-only copy of the current sample ring, for display polling.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.coalescer.lock().snapshot()
    }

    /// Halt the worker and close the link. Idempotent: a second stop is a
    /// no-op.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            debug!("stream session stopped");
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    mut link: HostLink,
    events: Receiver<PartialSample>,
    coalescer: Arc<Mutex<SampleCoalescer>>,
    stop: Arc<AtomicBool>,
    flush_interval: Duration,
) {
    let started = Instant::now();
    let mut last_flushed_ts: Option<u64> = None;
    let mut next_flush = Instant::now() + flush_interval;

    while !stop.load(Ordering::Relaxed) {
        match events.recv_timeout(Duration::from_millis(2)) {
            Ok(partial) => {
                let now_ms = started.elapsed().as_millis() as u64;
                let mut guard = coalescer.lock();
                guard.observe(&partial, now_ms);
                // drain whatever else queued up without blocking
                while let Ok(more) = events.try_recv() {
                    guard.observe(&more, now_ms);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // producers are gone; keep flushing until stop
                std::thread::sleep(Duration::from_millis(2));
            }
        }

        if Instant::now() >= next_flush {
            next_flush += flush_interval;
            flush_closed_window(&mut link, &coalescer, started, &mut last_flushed_ts);
        }
    }

    // release order: the link's close drops the writer before the device
    // handle, and stop must release it even if writes were failing
    link.close();
}

/// Send the newest record once its window has closed. A failed write logs
/// and discards the record; it is never retried or requeued.
fn flush_closed_window(
    link: &mut HostLink,
    coalescer: &Arc<Mutex<SampleCoalescer>>,
    started: Instant,
    last_flushed_ts: &mut Option<u64>,
) {
    let now_ms = started.elapsed().as_millis() as u64;
    let closed = {
        let guard = coalescer.lock();
        guard.latest().copied().filter(|sample| {
            now_ms.saturating_sub(sample.timestamp_ms) >= COALESCE_WINDOW_MS
                && *last_flushed_ts != Some(sample.timestamp_ms)
        })
    };

    if let Some(sample) = closed {
        *last_flushed_ts = Some(sample.timestamp_ms);
        let line = encode_sample(&sample);
        if let Err(e) = link.write_chunk(line.as_bytes()) {
            warn!(error = %e, "sample write failed, record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imulink_protocol::PartialSample;
    use imulink_transport::{TransportLink, mock_pair};

    fn read_all(link: &mut imulink_transport::MockLink) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let n = link.read_available(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn coalesced_record_reaches_the_link() {
        let (mut peer, mut link) = mock_pair();
        peer.open().unwrap();
        link.open().unwrap();

        let mut session = StreamSession::start(Box::new(link), StreamConfig::default()).unwrap();
        let events = session.event_sender();

        events.push(PartialSample::from_orientation(10.0, 20.0, 30.0));
        events.push(PartialSample::from_motion([1.0, 2.0, 3.0], [0.0, 0.0, 0.0]));

        // give the window time to close and flush
        std::thread::sleep(Duration::from_millis(80));
        session.stop();

        let received = read_all(&mut peer);
        let text = String::from_utf8(received).unwrap();
        assert!(
            text.contains("10.00,20.00,30.00,1.00,2.00,3.00\n"),
            "got: {text:?}"
        );
    }

    #[test]
    fn failed_writes_drop_records_and_keep_streaming() {
        let (mut peer, mut link) = mock_pair();
        peer.open().unwrap();
        link.open().unwrap();
        let switch = link.write_failure_switch();

        let mut session = StreamSession::start(Box::new(link), StreamConfig::default()).unwrap();
        let events = session.event_sender();

        switch.store(true, Ordering::Relaxed);
        events.push(PartialSample::from_orientation(1.0, 1.0, 1.0));
        std::thread::sleep(Duration::from_millis(60));

        // recovery: later records still flow
        switch.store(false, Ordering::Relaxed);
        events.push(PartialSample::from_orientation(2.0, 2.0, 2.0));
        std::thread::sleep(Duration::from_millis(80));
        session.stop();

        let text = String::from_utf8(read_all(&mut peer)).unwrap();
        assert!(!text.contains("1.00,1.00,1.00"), "got: {text:?}");
        assert!(text.contains("2.00,2.00,2.00"), "got: {text:?}");
    }

    #[test]
    fn snapshot_reflects_observations() {
        let (_peer, mut link) = mock_pair();
        link.open().unwrap();

        let mut session = StreamSession::start(Box::new(link), StreamConfig::default()).unwrap();
        session
            .event_sender()
            .push(PartialSample::from_orientation(5.0, 6.0, 7.0));
        std::thread::sleep(Duration::from_millis(30));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].orientation.alpha, Some(5.0));
        session.stop();
    }

    #[test]
    fn stop_is_idempotent_and_drop_safe() {
        let (_peer, mut link) = mock_pair();
        link.open().unwrap();

        let mut session = StreamSession::start(Box::new(link), StreamConfig::default()).unwrap();
        session.stop();
        session.stop();
        drop(session);
    }
}
