//! Layout-driven CAN re-encoder.
//!
//! Takes the six floats of a decoded telemetry record, packs them into bus
//! frames per the active [`FrameLayout`], and sends each frame in layout
//! order. The outcome of the whole batch collapses into a single reply
//! keyword for the upstream link.

use tracing::{trace, warn};

use crate::CanAdapter;
use imulink_protocol::{FrameLayout, Reply};

/// Re-encoder stage between the relay's line parser and the CAN bus.
///
/// If the CAN subsystem never came up, the adapter slot is `None` and every
/// relay call short-circuits to `ERR:NO_CAN_INIT` without touching the bus.
/// That condition is permanent for the process lifetime, mirroring a
/// failed controller init on the original bridge hardware.
pub struct CanPipeline<A> {
    adapter: Option<A>,
    layout: FrameLayout,
}

impl<A: CanAdapter> CanPipeline<A> {
    /// Pipeline with a working CAN adapter.
    pub fn new(adapter: A, layout: FrameLayout) -> Self {
        Self {
            adapter: Some(adapter),
            layout,
        }
    }

    /// Pipeline whose CAN subsystem failed to initialize. Every
    /// [`relay`](Self::relay) call reports `ERR:NO_CAN_INIT`.
    pub fn uninitialized(layout: FrameLayout) -> Self {
        Self {
            adapter: None,
            layout,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Pack and send one record.
    ///
    /// Cumulative success is the AND of the individual sends, with no
    /// rollback: frames already on the bus when a later send fails stay
    /// sent, and the whole batch still reports a single `ERR:CAN_SEND`.
    pub fn relay(&mut self, values: &[f32; 6]) -> Reply {
        let Some(adapter) = self.adapter.as_mut() else {
            return Reply::ErrNoCanInit;
        };

        let mut all_ok = true;
        for frame in self.layout.pack(values) {
            match adapter.send(frame) {
                Ok(()) => trace!(id = format_args!("0x{:X}", frame.id), "CAN frame sent"),
                Err(e) => {
                    warn!(id = format_args!("0x{:X}", frame.id), error = %e, "CAN send failed");
                    all_ok = false;
                }
            }
        }

        if all_ok { Reply::Ack } else { Reply::ErrCanSend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCanAdapter;

    #[test]
    fn three_frame_batch_matches_wire_layout() {
        let adapter = MockCanAdapter::new();
        let sent = adapter.sent_frames();
        let mut pipeline = CanPipeline::new(adapter, FrameLayout::three_frame());

        let reply = pipeline.relay(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(reply, Reply::Ack);

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 3);
        let mut expected = [0u8; 8];
        expected[..4].copy_from_slice(&1.0f32.to_le_bytes());
        expected[4..].copy_from_slice(&2.0f32.to_le_bytes());
        assert_eq!(frames[0].id, 0x501);
        assert_eq!(frames[0].data_slice(), &expected);
        assert_eq!(frames[1].id, 0x502);
        assert_eq!(frames[2].id, 0x503);
    }

    #[test]
    fn uninitialized_pipeline_short_circuits() {
        let mut pipeline: CanPipeline<MockCanAdapter> =
            CanPipeline::uninitialized(FrameLayout::three_frame());
        assert_eq!(
            pipeline.relay(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            Reply::ErrNoCanInit
        );
        assert!(!pipeline.is_initialized());
    }

    #[test]
    fn partial_failure_reports_once_and_keeps_sent_frames() {
        // second send of the batch fails; first and third stay on the bus
        let adapter = MockCanAdapter::new().fail_send(1);
        let sent = adapter.sent_frames();
        let mut pipeline = CanPipeline::new(adapter, FrameLayout::three_frame());

        let reply = pipeline.relay(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(reply, Reply::ErrCanSend);

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id, 0x501);
        assert_eq!(frames[1].id, 0x503);
    }

    #[test]
    fn four_frame_batch_sends_all_ids() {
        let adapter = MockCanAdapter::new();
        let sent = adapter.sent_frames();
        let mut pipeline = CanPipeline::new(adapter, FrameLayout::four_frame());

        assert_eq!(pipeline.relay(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), Reply::Ack);
        let ids: Vec<u16> = sent.lock().unwrap().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x501, 0x502, 0x503, 0x504]);
    }
}
