//! In-memory CAN adapter for tests and bus-less development.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::{CanAdapter, CanError};
use imulink_protocol::BusFrame;

/// Shared view of everything a [`MockCanAdapter`] sent, in send order.
pub type SentFrames = Arc<Mutex<Vec<BusFrame>>>;

/// Mock CAN endpoint.
///
/// Frames sent are recorded; frames queued with [`MockCanAdapter::inject`]
/// are handed back by `try_receive`. Send failures can be scheduled per
/// index to exercise partial-batch behavior.
pub struct MockCanAdapter {
    sent: SentFrames,
    rx: VecDeque<BusFrame>,
    /// Send attempts (0-based) that should fail.
    failing_sends: Vec<usize>,
    attempts: usize,
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            rx: VecDeque::new(),
            failing_sends: Vec::new(),
            attempts: 0,
        }
    }

    /// Handle for asserting on sent frames after the adapter moved into
    /// the component under test.
    pub fn sent_frames(&self) -> SentFrames {
        Arc::clone(&self.sent)
    }

    /// Make the n-th send attempt (0-based, counted over the adapter's
    /// lifetime) fail.
    pub fn fail_send(mut self, attempt: usize) -> Self {
        self.failing_sends.push(attempt);
        self
    }

    /// Queue a frame for `try_receive`.
    pub fn inject(&mut self, frame: BusFrame) {
        self.rx.push_back(frame);
    }
}

impl Default for MockCanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: BusFrame) -> Result<(), CanError> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.failing_sends.contains(&attempt) {
            return Err(CanError::SendRejected(format!(
                "scheduled failure at attempt {attempt}"
            )));
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<BusFrame>, CanError> {
        Ok(self.rx.pop_front())
    }
}
