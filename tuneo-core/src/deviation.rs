//! Tuning deviation between the detected pitch and the locked target.

use serde::{Deserialize, Serialize};

use crate::instrument::StringCandidate;
use crate::tuning;

/// How far the current pitch is from the locked string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    /// Normalized gauge value in (-1, 1); 0 is in tune, positive is sharp.
    pub gauge: f32,
    pub cents: f32,
}

impl Deviation {
    /// Returns `None` when there is no pitch or no locked string.
    pub fn compute(pitch: f32, target: Option<&StringCandidate>) -> Option<Self> {
        let target = target?;
        if !(pitch > 0.0) || !(target.frequency > 0.0) {
            return None;
        }
        Some(Self {
            gauge: gauge_deviation(pitch, target.frequency),
            cents: tuning::calculate_cents_deviation(pitch, target.frequency),
        })
    }
}

/// `atan(10 (pitch - f0) / f0) / (pi / 2)`.
///
/// Saturates smoothly towards ±1 for large offsets.
pub fn gauge_deviation(pitch: f32, f0: f32) -> f32 {
    (10.0 * (pitch - f0) / f0).atan() / std::f32::consts::FRAC_PI_2
}
