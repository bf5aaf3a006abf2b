//! Mock sensor source.
//!
//! Stands in for the handheld device's sensors when streaming without
//! hardware: two independent timer threads push orientation and motion
//! observations into a session's event queue, deliberately unsynchronized
//! so the coalescer sees the same interleaving a real device produces.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use imulink_protocol::PartialSample;

use crate::session::EventSender;

/// Generator tuning.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Emission period per source; 16 ms approximates a 60 Hz sensor.
    pub period: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(16),
        }
    }
}

/// Two synthetic sensor producers bound to one event queue.
///
/// `stop` halts both timers and is idempotent; dropping the source stops
/// it too.
pub struct MockMotionSource {
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl MockMotionSource {
    pub fn spawn(events: EventSender, config: GeneratorConfig) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(2);

        workers.push(
            std::thread::Builder::new()
                .name("imulink-gen-orientation".into())
                .spawn({
                    let stop = Arc::clone(&stop);
                    let events = events.clone();
                    let period = config.period;
                    move || orientation_loop(events, stop, period)
                })?,
        );
        workers.push(
            std::thread::Builder::new()
                .name("imulink-gen-motion".into())
                .spawn({
                    let stop = Arc::clone(&stop);
                    let period = config.period;
                    move || motion_loop(events, stop, period)
                })?,
        );

        debug!("mock motion source running");
        Ok(Self { stop, workers })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for MockMotionSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn orientation_loop(events: EventSender, stop: Arc<AtomicBool>, period: Duration) {
    let started = Instant::now();
    let mut rng = rand::thread_rng();
    while !stop.load(Ordering::Relaxed) {
        let t = started.elapsed().as_secs_f32();
        let jitter: f32 = rng.gen_range(-0.05..0.05);
        events.push(PartialSample::from_orientation(
            (t * 40.0) % 360.0 + jitter,
            30.0 * (t * 1.3).sin(),
            15.0 * (t * 0.7).cos(),
        ));
        spin_sleep::sleep(period);
    }
}

fn motion_loop(events: EventSender, stop: Arc<AtomicBool>, period: Duration) {
    let started = Instant::now();
    let mut rng = rand::thread_rng();
    while !stop.load(Ordering::Relaxed) {
        let t = started.elapsed().as_secs_f32();
        let jitter: f32 = rng.gen_range(-0.02..0.02);
        events.push(PartialSample::from_motion(
            [
                0.4 * (t * 2.0).sin() + jitter,
                0.4 * (t * 2.0).cos(),
                9.81 + 0.1 * (t * 5.0).sin(),
            ],
            [8.0 * (t * 1.3).cos(), 4.0 * (t * 0.7).sin(), 40.0 + jitter],
        ));
        spin_sleep::sleep(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{StreamConfig, StreamSession};
    use imulink_transport::{TransportLink, mock_pair};

    #[test]
    fn generator_feeds_the_session_and_stops_cleanly() {
        let (_peer, mut link) = mock_pair();
        link.open().unwrap();

        let mut session = StreamSession::start(Box::new(link), StreamConfig::default()).unwrap();
        let mut source = MockMotionSource::spawn(
            session.event_sender(),
            GeneratorConfig {
                period: Duration::from_millis(2),
            },
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(60));
        source.stop();
        source.stop(); // idempotent

        let snapshot = session.snapshot();
        assert!(!snapshot.is_empty());
        // both sources contributed within the same windows
        assert!(snapshot.iter().any(|s| s.orientation.alpha.is_some()));
        assert!(snapshot.iter().any(|s| s.acceleration.z.is_some()));
        session.stop();
    }
}
