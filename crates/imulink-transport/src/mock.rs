//! In-memory link pair for tests.
//!
//! `mock_pair` cross-connects two ends: bytes written on one are read on
//! the other, byte-exact and in order. Open refusal and write failure can
//! be scripted to exercise the error paths of whatever owns the link.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{LinkState, TransportError, TransportLink};

type ByteQueue = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory duplex pipe.
pub struct MockLink {
    rx: ByteQueue,
    tx: ByteQueue,
    state: LinkState,
    refuse_open: bool,
    fail_writes: Arc<AtomicBool>,
    connect_notice: bool,
}

/// Cross-connected pair; what the first end writes, the second reads, and
/// vice versa.
pub fn mock_pair() -> (MockLink, MockLink) {
    let a_to_b: ByteQueue = Arc::new(Mutex::new(VecDeque::new()));
    let b_to_a: ByteQueue = Arc::new(Mutex::new(VecDeque::new()));
    (
        MockLink::from_queues(Arc::clone(&b_to_a), Arc::clone(&a_to_b)),
        MockLink::from_queues(a_to_b, b_to_a),
    )
}

impl MockLink {
    fn from_queues(rx: ByteQueue, tx: ByteQueue) -> Self {
        Self {
            rx,
            tx,
            state: LinkState::Disconnected,
            refuse_open: false,
            fail_writes: Arc::new(AtomicBool::new(false)),
            connect_notice: false,
        }
    }

    /// Make every subsequent `open` fail.
    pub fn refuse_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// Pretend to be a WebUSB-style link that wants a connect notice.
    pub fn with_connect_notice(mut self) -> Self {
        self.connect_notice = true;
        self
    }

    /// Toggle write failure at runtime; the returned handle stays valid
    /// after the link moves into the component under test.
    pub fn write_failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_writes)
    }
}

impl TransportLink for MockLink {
    fn open(&mut self) -> Result<LinkState, TransportError> {
        if self.state == LinkState::Connected {
            return Ok(self.state);
        }
        self.state = LinkState::Connecting;
        if self.refuse_open {
            self.state = LinkState::Error;
            return Err(TransportError::NoDevice);
        }
        self.state = LinkState::Connected;
        Ok(self.state)
    }

    fn close(&mut self) {
        self.state = LinkState::Disconnected;
    }

    fn state(&self) -> LinkState {
        self.state
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.state != LinkState::Connected {
            return Err(TransportError::NotConnected);
        }
        let mut rx = self.rx.lock().unwrap();
        let mut copied = 0;
        while copied < buf.len() {
            match rx.pop_front() {
                Some(b) => {
                    buf[copied] = b;
                    copied += 1;
                }
                None => break,
            }
        }
        Ok(copied)
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.state != LinkState::Connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(TransportError::Io(std::io::Error::other(
                "scripted write failure",
            )));
        }
        self.tx.lock().unwrap().extend(bytes.iter().copied());
        Ok(())
    }

    fn emits_connect_notice(&self) -> bool {
        self.connect_notice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_moves_bytes_both_ways() {
        let (mut a, mut b) = mock_pair();
        a.open().unwrap();
        b.open().unwrap();

        a.write_chunk(b"hello").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(b.read_available(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");

        b.write_chunk(b"yo").unwrap();
        assert_eq!(a.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"yo");
    }

    #[test]
    fn read_is_nonblocking_when_empty() {
        let (mut a, _b) = mock_pair();
        a.open().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(a.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn scripted_failures() {
        let (mut a, _b) = mock_pair();
        let switch = a.write_failure_switch();
        a.open().unwrap();

        switch.store(true, Ordering::Relaxed);
        assert!(a.write_chunk(b"x").is_err());
        switch.store(false, Ordering::Relaxed);
        assert!(a.write_chunk(b"x").is_ok());

        let mut refused = MockLink::from_queues(
            Arc::new(Mutex::new(VecDeque::new())),
            Arc::new(Mutex::new(VecDeque::new())),
        )
        .refuse_open();
        assert!(refused.open().is_err());
        assert_eq!(refused.state(), LinkState::Error);
        // retry path goes back through Connecting
        assert!(refused.open().is_err());
    }

    #[test]
    fn state_machine_open_close_idempotent() {
        let (mut a, _b) = mock_pair();
        assert_eq!(a.state(), LinkState::Disconnected);
        a.open().unwrap();
        assert_eq!(a.state(), LinkState::Connected);
        a.close();
        a.close();
        assert_eq!(a.state(), LinkState::Disconnected);

        // device-removed notification on a closed link is a no-op
        a.notify_disconnected();
        assert_eq!(a.state(), LinkState::Disconnected);
    }
}
