//! # imulink Host
//!
//! Host side of the telemetry bridge: merges the two sensor event streams
//! into timestamped records, keeps the bounded sample ring, and streams
//! encoded lines over whatever link the session owns.
//!
//! The pieces compose as a single-consumer pipeline: sources push
//! `PartialSample` events through an [`EventSender`], one worker drains
//! the queue into the [`SampleCoalescer`], and closed windows flush to the
//! link fire-and-forget.

pub mod coalescer;
pub mod generator;
pub mod session;

pub use coalescer::{COALESCE_WINDOW_MS, SAMPLE_BUFFER_CAPACITY, SampleCoalescer};
pub use generator::{GeneratorConfig, MockMotionSource};
pub use session::{EventSender, HostLink, SessionError, StreamConfig, StreamSession};
