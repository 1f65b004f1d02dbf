//! Compressor effect
//!
//! Feed-forward peak compressor with a hard knee and one-pole attack/release
//! smoothing of the gain. Not part of the random catalog; the batch
//! processor can run it as an optional master stage after each chain.

use serde::{Deserialize, Serialize};

use super::effect::Effect;
use crate::engine::{db_to_linear, linear_to_db};
use crate::error::{FxError, Result};

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    /// Threshold level in dB (-60 to 0 dB)
    pub threshold_db: f32,
    /// Compression ratio (1.0 to 20.0)
    pub ratio: f32,
    /// Attack time in milliseconds
    pub attack_ms: f32,
    /// Release time in milliseconds
    pub release_ms: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
        }
    }
}

impl CompressorParams {
    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        let check = |param: &str, value: f32, min: f32, max: f32| {
            if value < min || value > max {
                Err(FxError::InvalidParameter {
                    effect: "compressor".to_string(),
                    param: param.to_string(),
                    value,
                    expected: format!("{} to {}", min, max),
                })
            } else {
                Ok(())
            }
        };
        check("threshold_db", self.threshold_db, -60.0, 0.0)?;
        check("ratio", self.ratio, 1.0, 20.0)?;
        check("attack_ms", self.attack_ms, 0.0, 1000.0)?;
        check("release_ms", self.release_ms, 0.0, 5000.0)?;
        Ok(())
    }
}

/// Peak compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current linear gain (1.0 = no reduction)
    gain: f32,
}

impl Compressor {
    pub fn new(params: CompressorParams, sample_rate: u32) -> Self {
        // coeff = exp(-1 / time_in_samples)
        let coeff = |time_ms: f32| {
            let samples = time_ms / 1000.0 * sample_rate as f32;
            if samples > 0.0 {
                (-1.0 / samples).exp()
            } else {
                0.0
            }
        };
        Self {
            params,
            attack_coeff: coeff(params.attack_ms),
            release_coeff: coeff(params.release_ms),
            gain: 1.0,
        }
    }

    /// Current gain reduction in dB (negative when compressing)
    pub fn gain_reduction_db(&self) -> f32 {
        linear_to_db(self.gain)
    }

    /// Hard-knee gain reduction for an input level, in dB
    fn compute_gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.params.threshold_db;
        if input_db <= threshold {
            0.0
        } else {
            (threshold + (input_db - threshold) / self.params.ratio) - input_db
        }
    }
}

impl Effect for Compressor {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input_db = linear_to_db(sample.abs()).max(-96.0);
            let target = db_to_linear(self.compute_gain_reduction_db(input_db));

            let coeff = if target < self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * target;
            *sample *= self.gain;
        }
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn effect_type(&self) -> &'static str {
        "compressor"
    }
}
