//! Time-windowed sample coalescing.
//!
//! Orientation and motion arrive as separate event streams on separate
//! clocks. Observations landing within one 20 ms window merge into a
//! single record; the buffer keeps the most recent 50 records and evicts
//! from the front.
//!
//! Two sources may interleave in either order inside a window. The merged
//! result depends only on arrival order, never on which sensor a value
//! came from; that nondeterminism is part of the contract.

use std::collections::VecDeque;

use imulink_protocol::{PartialSample, Sample};

/// Observations within this many milliseconds of the open record merge
/// into it.
pub const COALESCE_WINDOW_MS: u64 = 20;

/// Ring capacity; the oldest record is evicted on overflow.
pub const SAMPLE_BUFFER_CAPACITY: usize = 50;

/// Single-consumer coalescer owning the sample ring.
///
/// `observe` never blocks and never rejects input. Downstream consumers
/// only ever see cloned snapshots.
#[derive(Debug, Default)]
pub struct SampleCoalescer {
    buffer: VecDeque<Sample>,
}

impl SampleCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an observation into the open window, or open a new one.
    ///
    /// Later writes override only the sub-fields they carry.
    pub fn observe(&mut self, partial: &PartialSample, now_ms: u64) {
        let merged = match self.buffer.back_mut() {
            Some(last) if now_ms.saturating_sub(last.timestamp_ms) < COALESCE_WINDOW_MS => {
                last.overlay(partial);
                true
            }
            _ => false,
        };
        if !merged {
            let mut sample = Sample::new(now_ms);
            sample.overlay(partial);
            self.buffer.push_back(sample);
        }

        while self.buffer.len() > SAMPLE_BUFFER_CAPACITY {
            self.buffer.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Most recent record, still mutable through `observe` while its
    /// window is open.
    pub fn latest(&self) -> Option<&Sample> {
        self.buffer.back()
    }

    /// Read-only copy of the ring, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.buffer.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_inside_window_merge_into_one_sample() {
        let mut coalescer = SampleCoalescer::new();
        coalescer.observe(&PartialSample::from_orientation(1.0, 2.0, 3.0), 100);
        coalescer.observe(
            &PartialSample::from_motion([4.0, 5.0, 6.0], [7.0, 8.0, 9.0]),
            110,
        );

        assert_eq!(coalescer.len(), 1);
        let sample = coalescer.latest().unwrap();
        assert_eq!(sample.timestamp_ms, 100);
        assert_eq!(sample.orientation.alpha, Some(1.0));
        assert_eq!(sample.acceleration.y, Some(5.0));
        assert_eq!(sample.rotation_rate.gamma, Some(9.0));
    }

    #[test]
    fn each_sub_field_equals_its_last_observation() {
        let mut coalescer = SampleCoalescer::new();
        coalescer.observe(&PartialSample::from_orientation(1.0, 1.0, 1.0), 100);
        coalescer.observe(&PartialSample::from_orientation(2.0, 2.0, 2.0), 105);
        coalescer.observe(
            &PartialSample::from_motion([3.0, 3.0, 3.0], [0.0, 0.0, 0.0]),
            110,
        );

        let sample = coalescer.latest().unwrap();
        assert_eq!(sample.orientation.alpha, Some(2.0));
        assert_eq!(sample.acceleration.x, Some(3.0));
    }

    #[test]
    fn merge_is_arrival_ordered_regardless_of_source() {
        // the two sources swapped between runs must produce the same record
        let orientation = PartialSample::from_orientation(1.0, 2.0, 3.0);
        let motion = PartialSample::from_motion([4.0, 5.0, 6.0], [7.0, 8.0, 9.0]);

        let mut first = SampleCoalescer::new();
        first.observe(&orientation, 100);
        first.observe(&motion, 101);

        let mut second = SampleCoalescer::new();
        second.observe(&motion, 100);
        second.observe(&orientation, 101);

        // disjoint sub-fields: order cannot matter, only timestamps differ
        let a = first.latest().unwrap();
        let b = second.latest().unwrap();
        assert_eq!(a.orientation, b.orientation);
        assert_eq!(a.acceleration, b.acceleration);
        assert_eq!(a.rotation_rate, b.rotation_rate);
    }

    #[test]
    fn observation_outside_window_opens_new_sample() {
        let mut coalescer = SampleCoalescer::new();
        coalescer.observe(&PartialSample::from_orientation(1.0, 1.0, 1.0), 100);
        coalescer.observe(&PartialSample::from_orientation(2.0, 2.0, 2.0), 120);

        assert_eq!(coalescer.len(), 2);
        assert_eq!(coalescer.latest().unwrap().timestamp_ms, 120);
    }

    #[test]
    fn buffer_never_exceeds_capacity() {
        let mut coalescer = SampleCoalescer::new();
        for i in 0..500u64 {
            coalescer.observe(
                &PartialSample::from_orientation(i as f32, 0.0, 0.0),
                i * 100,
            );
        }
        assert_eq!(coalescer.len(), SAMPLE_BUFFER_CAPACITY);

        // oldest evicted: the snapshot starts at observation 450
        let snapshot = coalescer.snapshot();
        assert_eq!(snapshot[0].orientation.alpha, Some(450.0));
        assert_eq!(snapshot.last().unwrap().orientation.alpha, Some(499.0));
    }

    #[test]
    fn snapshot_is_detached_from_the_ring() {
        let mut coalescer = SampleCoalescer::new();
        coalescer.observe(&PartialSample::from_orientation(1.0, 1.0, 1.0), 100);
        let snapshot = coalescer.snapshot();
        coalescer.observe(&PartialSample::from_orientation(9.0, 9.0, 9.0), 105);

        assert_eq!(snapshot[0].orientation.alpha, Some(1.0));
    }
}
