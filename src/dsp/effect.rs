//! Effect trait and catalog definitions
//!
//! Each catalog entry is an [`EffectKind`] variant that knows its name, its
//! parameter ranges, and how to build the processor for a drawn
//! [`EffectSpec`]. Dispatch is by enum match, never by function identity.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Chorus, Delay, Distortion, Phaser, Reverb};
use crate::engine::AudioBuffer;
use crate::error::{FxError, Result};

/// Base trait for all DSP processors
///
/// Processors are stateful while running (delay lines, filter memories) but
/// are built fresh for every application, so applying a spec is a pure
/// function of its input buffer.
pub trait Effect: Send {
    /// Process mono samples in-place
    fn process(&mut self, samples: &mut [f32]);

    /// Clear delay lines and filter state
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;
}

// ============================================================================
// Parameter ranges
// ============================================================================

/// Inclusive valid range for one effect parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamRange {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    const fn new(name: &'static str, min: f32, max: f32) -> Self {
        Self { name, min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Draw a value uniformly from the range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        rng.gen_range(self.min..=self.max)
    }
}

const REVERB_PARAMS: [ParamRange; 1] = [ParamRange::new("room_size", 0.1, 1.0)];

const DELAY_PARAMS: [ParamRange; 2] = [
    ParamRange::new("delay_time", 0.1, 1.0),
    ParamRange::new("feedback", 0.0, 0.75),
];

const DISTORTION_PARAMS: [ParamRange; 1] = [ParamRange::new("drive", 5.0, 20.0)];

const CHORUS_PARAMS: [ParamRange; 2] = [
    ParamRange::new("rate", 0.5, 4.0),
    ParamRange::new("depth", 0.1, 0.7),
];

const PHASER_PARAMS: [ParamRange; 2] = [
    ParamRange::new("rate", 0.1, 5.0),
    ParamRange::new("depth", 0.1, 1.0),
];

// ============================================================================
// Effect kinds
// ============================================================================

/// Entries of the fixed effect catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Reverb,
    Delay,
    Distortion,
    Chorus,
    Phaser,
}

impl EffectKind {
    /// Every catalog entry, in catalog order
    pub const ALL: [EffectKind; 5] = [
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Distortion,
        EffectKind::Chorus,
        EffectKind::Phaser,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::Delay => "delay",
            EffectKind::Distortion => "distortion",
            EffectKind::Chorus => "chorus",
            EffectKind::Phaser => "phaser",
        }
    }

    /// Look up a catalog entry by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Valid parameter ranges, in the order parameters are drawn
    pub fn param_ranges(&self) -> &'static [ParamRange] {
        match self {
            EffectKind::Reverb => &REVERB_PARAMS,
            EffectKind::Delay => &DELAY_PARAMS,
            EffectKind::Distortion => &DISTORTION_PARAMS,
            EffectKind::Chorus => &CHORUS_PARAMS,
            EffectKind::Phaser => &PHASER_PARAMS,
        }
    }

    /// Draw every parameter uniformly within its range
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> EffectSpec {
        let ranges = self.param_ranges();
        // Draw order follows the range table so seeded runs stay stable
        let first = ranges[0].sample(rng);
        match self {
            EffectKind::Reverb => EffectSpec::Reverb { room_size: first },
            EffectKind::Delay => EffectSpec::Delay {
                delay_time: first,
                feedback: ranges[1].sample(rng),
            },
            EffectKind::Distortion => EffectSpec::Distortion { drive: first },
            EffectKind::Chorus => EffectSpec::Chorus {
                rate: first,
                depth: ranges[1].sample(rng),
            },
            EffectKind::Phaser => EffectSpec::Phaser {
                rate: first,
                depth: ranges[1].sample(rng),
            },
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Effect specs
// ============================================================================

/// One effect with concrete parameter values. Immutable once drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "lowercase")]
pub enum EffectSpec {
    Reverb { room_size: f32 },
    /// `delay_time` in seconds, `feedback` as a ratio
    Delay { delay_time: f32, feedback: f32 },
    /// `drive` in dB
    Distortion { drive: f32 },
    /// `rate` in Hz
    Chorus { rate: f32, depth: f32 },
    /// `rate` in Hz
    Phaser { rate: f32, depth: f32 },
}

impl EffectSpec {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectSpec::Reverb { .. } => EffectKind::Reverb,
            EffectSpec::Delay { .. } => EffectKind::Delay,
            EffectSpec::Distortion { .. } => EffectKind::Distortion,
            EffectSpec::Chorus { .. } => EffectKind::Chorus,
            EffectSpec::Phaser { .. } => EffectKind::Phaser,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Parameter name/value pairs in catalog order
    pub fn params(&self) -> Vec<(&'static str, f32)> {
        let values: Vec<f32> = match *self {
            EffectSpec::Reverb { room_size } => vec![room_size],
            EffectSpec::Delay {
                delay_time,
                feedback,
            } => vec![delay_time, feedback],
            EffectSpec::Distortion { drive } => vec![drive],
            EffectSpec::Chorus { rate, depth } | EffectSpec::Phaser { rate, depth } => {
                vec![rate, depth]
            }
        };
        self.kind()
            .param_ranges()
            .iter()
            .map(|r| r.name)
            .zip(values)
            .collect()
    }

    /// Check every parameter against its documented range
    pub fn validate(&self) -> Result<()> {
        for (range, (_, value)) in self.kind().param_ranges().iter().zip(self.params()) {
            if !range.contains(value) {
                return Err(FxError::InvalidParameter {
                    effect: self.name().to_string(),
                    param: range.name.to_string(),
                    value,
                    expected: format!("{} to {}", range.min, range.max),
                });
            }
        }
        Ok(())
    }

    /// Build a fresh processor for this spec
    pub fn build(&self, sample_rate: u32) -> Box<dyn Effect> {
        match *self {
            EffectSpec::Reverb { room_size } => Box::new(Reverb::new(room_size, sample_rate)),
            EffectSpec::Delay {
                delay_time,
                feedback,
            } => Box::new(Delay::new(delay_time, feedback, sample_rate)),
            EffectSpec::Distortion { drive } => Box::new(Distortion::new(drive)),
            EffectSpec::Chorus { rate, depth } => Box::new(Chorus::new(rate, depth, sample_rate)),
            EffectSpec::Phaser { rate, depth } => Box::new(Phaser::new(rate, depth, sample_rate)),
        }
    }

    /// Apply this effect to `buffer`, returning a new buffer
    ///
    /// The output has the same length and sample rate as the input.
    ///
    /// # Errors
    /// * `InvalidParameter` - If a parameter lies outside its range
    /// * `DspOverflow` - If the processor produced NaN or infinite samples
    pub fn apply(&self, buffer: &AudioBuffer) -> Result<AudioBuffer> {
        self.validate()?;
        let mut samples = buffer.samples().to_vec();
        let mut processor = self.build(buffer.sample_rate());
        processor.process(&mut samples);

        if samples.iter().any(|s| !s.is_finite()) {
            return Err(FxError::DspOverflow {
                effect: self.name().to_string(),
            });
        }
        buffer.with_samples(samples)
    }
}

impl std::fmt::Display for EffectSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, (name, value)) in self.params().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:.3}", name, value)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_case::test_case;

    #[test]
    fn test_from_name_roundtrip() {
        for kind in EffectKind::ALL {
            assert_eq!(EffectKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EffectKind::from_name("Reverb"), Some(EffectKind::Reverb));
        assert_eq!(EffectKind::from_name("compressor"), None);
    }

    #[test]
    fn test_draw_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            for kind in EffectKind::ALL {
                let spec = kind.draw(&mut rng);
                assert_eq!(spec.kind(), kind);
                assert!(spec.validate().is_ok(), "{} out of range", spec);
            }
        }
    }

    #[test]
    fn test_params_named_in_catalog_order() {
        let spec = EffectSpec::Delay {
            delay_time: 0.25,
            feedback: 0.5,
        };
        assert_eq!(spec.params(), vec![("delay_time", 0.25), ("feedback", 0.5)]);
        assert_eq!(spec.to_string(), "delay(delay_time=0.250, feedback=0.500)");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let spec = EffectSpec::Distortion { drive: 40.0 };
        let err = spec.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_spec_serializes_with_tag() {
        let spec = EffectSpec::Chorus {
            rate: 1.0,
            depth: 0.5,
        };
        let json = serde_json::to_value(spec).unwrap();
        assert_eq!(json["effect"], "chorus");
        let back: EffectSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test_case(EffectSpec::Reverb { room_size: 1.0 } ; "reverb")]
    #[test_case(EffectSpec::Delay { delay_time: 0.1, feedback: 0.75 } ; "delay")]
    #[test_case(EffectSpec::Distortion { drive: 20.0 } ; "distortion")]
    #[test_case(EffectSpec::Chorus { rate: 4.0, depth: 0.7 } ; "chorus")]
    #[test_case(EffectSpec::Phaser { rate: 5.0, depth: 1.0 } ; "phaser")]
    fn test_apply_preserves_length_and_rate(spec: EffectSpec) {
        let buffer = AudioBuffer::sine_wave(220.0, 0.3, 22050).unwrap();
        let out = spec.apply(&buffer).unwrap();
        assert_eq!(out.len(), buffer.len());
        assert_eq!(out.sample_rate(), buffer.sample_rate());
        assert!(out.is_finite());
    }

    #[test_case(EffectSpec::Reverb { room_size: 0.1 } ; "reverb")]
    #[test_case(EffectSpec::Delay { delay_time: 1.0, feedback: 0.0 } ; "delay")]
    #[test_case(EffectSpec::Distortion { drive: 5.0 } ; "distortion")]
    #[test_case(EffectSpec::Chorus { rate: 0.5, depth: 0.1 } ; "chorus")]
    #[test_case(EffectSpec::Phaser { rate: 0.1, depth: 0.1 } ; "phaser")]
    fn test_apply_single_sample(spec: EffectSpec) {
        let buffer = AudioBuffer::new(vec![0.5], 8000).unwrap();
        let out = spec.apply(&buffer).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let buffer = AudioBuffer::sine_wave(440.0, 0.1, 8000).unwrap();
        let before = buffer.clone();
        let _ = EffectSpec::Distortion { drive: 12.0 }.apply(&buffer).unwrap();
        assert_eq!(buffer, before);
    }
}
