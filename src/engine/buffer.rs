//! Audio Buffer Management
//!
//! Provides the mono audio buffer shared by the signal converter, the effect
//! library and the batch processor. Samples are 32-bit float, nominally in
//! the range [-1.0, 1.0].

use crate::error::{FxError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// AudioBuffer
// ============================================================================

/// Mono audio buffer tagged with its sample rate
///
/// Invariants: at least one sample, sample rate above zero. Both are checked
/// on construction, so every `AudioBuffer` in circulation satisfies them.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from mono samples
    ///
    /// # Errors
    /// * `EmptyAudio` - If `samples` is empty
    /// * `InvalidSampleRate` - If `sample_rate` is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(FxError::InvalidSampleRate { sample_rate });
        }
        if samples.is_empty() {
            return Err(FxError::EmptyAudio);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Generate a sine wave, mostly useful for tests and fixtures
    pub fn sine_wave(frequency: f32, duration_secs: f32, sample_rate: u32) -> Result<Self> {
        let num_samples = (duration_secs * sample_rate as f32) as usize;
        let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate.max(1) as f32;
        let samples = (0..num_samples)
            .map(|i| 0.5 * (angular_freq * i as f32).sin())
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Build a buffer with the same sample rate and new samples
    pub fn with_samples(&self, samples: Vec<f32>) -> Result<Self> {
        Self::new(samples, self.sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples (always at least one)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Check that every sample is finite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// RMS level in dB. Returns `f32::NEG_INFINITY` for digital silence.
    pub fn rms_db(&self) -> f32 {
        let sum_squares: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_squares / self.samples.len() as f64).sqrt() as f32;
        linear_to_db(rms)
    }
}
