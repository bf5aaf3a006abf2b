//! # imulink Relay
//!
//! The firmware-style stage of the bridge: a single-threaded cooperative
//! poll loop that assembles telemetry lines from an upstream link, answers
//! liveness probes, echoes raw bytes to a downstream link, re-encodes
//! records onto the CAN bus, and emits a periodic heartbeat.
//!
//! All waiting is busy-polling of "bytes available"; nothing in the loop
//! blocks, and malformed input never halts it.

pub mod forwarder;
pub mod heartbeat;

pub use forwarder::{DynCanPipeline, DynLink, RelayError, RelayForwarder};
pub use heartbeat::{DEFAULT_HEARTBEAT_PERIOD, HeartbeatMonitor};
