//! IMU sample model.
//!
//! Two independently-clocked sensors (orientation, motion) each deliver
//! partial observations. The host coalesces them into `Sample` records;
//! a sub-field stays unset until some observation supplies it, and encodes
//! as 0.0 once serialized.

/// Euler orientation in degrees. Unset until first observed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub gamma: Option<f32>,
}

/// Linear acceleration in m/s². Unset until first observed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

/// Angular velocity in deg/s. Unset until first observed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationRate {
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub gamma: Option<f32>,
}

/// One observation from a single sensor. Carries only the sub-fields that
/// sensor produced; everything else stays `None` and is left untouched on
/// merge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialSample {
    pub orientation: Orientation,
    pub acceleration: Acceleration,
    pub rotation_rate: RotationRate,
}

impl PartialSample {
    /// Observation carrying only orientation angles.
    pub fn from_orientation(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self {
            orientation: Orientation {
                alpha: Some(alpha),
                beta: Some(beta),
                gamma: Some(gamma),
            },
            ..Default::default()
        }
    }

    /// Observation carrying acceleration and rotation rate, the shape the
    /// motion sensor delivers.
    pub fn from_motion(accel: [f32; 3], rate: [f32; 3]) -> Self {
        Self {
            acceleration: Acceleration {
                x: Some(accel[0]),
                y: Some(accel[1]),
                z: Some(accel[2]),
            },
            rotation_rate: RotationRate {
                alpha: Some(rate[0]),
                beta: Some(rate[1]),
                gamma: Some(rate[2]),
            },
            ..Default::default()
        }
    }
}

/// A merged sample record.
///
/// Created on the first observation of a coalescing window, then mutated in
/// place by later observations inside the same window. Last write wins per
/// sub-field, not per record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds on the host clock at window open.
    pub timestamp_ms: u64,
    pub orientation: Orientation,
    pub acceleration: Acceleration,
    pub rotation_rate: RotationRate,
}

impl Sample {
    /// New record with every sub-field unset.
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            orientation: Orientation::default(),
            acceleration: Acceleration::default(),
            rotation_rate: RotationRate::default(),
        }
    }

    /// Overlay an observation: only the sub-fields present in `partial`
    /// are written, the rest keep their current value.
    pub fn overlay(&mut self, partial: &PartialSample) {
        merge(&mut self.orientation.alpha, partial.orientation.alpha);
        merge(&mut self.orientation.beta, partial.orientation.beta);
        merge(&mut self.orientation.gamma, partial.orientation.gamma);
        merge(&mut self.acceleration.x, partial.acceleration.x);
        merge(&mut self.acceleration.y, partial.acceleration.y);
        merge(&mut self.acceleration.z, partial.acceleration.z);
        merge(&mut self.rotation_rate.alpha, partial.rotation_rate.alpha);
        merge(&mut self.rotation_rate.beta, partial.rotation_rate.beta);
        merge(&mut self.rotation_rate.gamma, partial.rotation_rate.gamma);
    }

    /// The six serialized fields in wire order:
    /// orientation alpha/beta/gamma, acceleration x/y/z.
    /// Unset sub-fields default to 0.0 so the codec never emits a
    /// non-numeric token.
    pub fn wire_fields(&self) -> [f32; 6] {
        [
            self.orientation.alpha.unwrap_or(0.0),
            self.orientation.beta.unwrap_or(0.0),
            self.orientation.gamma.unwrap_or(0.0),
            self.acceleration.x.unwrap_or(0.0),
            self.acceleration.y.unwrap_or(0.0),
            self.acceleration.z.unwrap_or(0.0),
        ]
    }
}

fn merge(slot: &mut Option<f32>, incoming: Option<f32>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}
