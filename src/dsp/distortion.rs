//! Distortion Effect
//!
//! Hyperbolic-tangent waveshaper driven by a gain in dB. Output is bounded
//! to (-1, 1) regardless of drive.

use super::effect::Effect;
use crate::engine::db_to_linear;

/// Tanh waveshaping distortion
#[derive(Debug, Clone)]
pub struct Distortion {
    gain: f32,
}

impl Distortion {
    /// Create a distortion with `drive_db` of pre-gain
    pub fn new(drive_db: f32) -> Self {
        Self {
            gain: db_to_linear(drive_db),
        }
    }
}

impl Effect for Distortion {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = (*sample * self.gain).tanh();
        }
    }

    fn reset(&mut self) {
        // Stateless
    }

    fn effect_type(&self) -> &'static str {
        "distortion"
    }
}
