//! Reverb effect implementation
//!
//! Implements the Freeverb algorithm on a mono signal:
//! - 8 parallel comb filters with damping in the feedback path
//! - 4 series allpass filters for diffusion
//!
//! Damping and the wet/dry balance are fixed; only the room size varies.

use super::effect::Effect;

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f32 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Fixed gain for allpass filters (standard Freeverb value)
const ALLPASS_GAIN: f32 = 0.5;

/// Input attenuation ahead of the comb bank
const FIXED_GAIN: f32 = 0.015;

/// Scale factor for room size parameter to feedback
const ROOM_SCALE: f32 = 0.28;

/// Offset for room size parameter to feedback
const ROOM_OFFSET: f32 = 0.7;

/// Scale factor for damping parameter
const DAMP_SCALE: f32 = 0.4;

const DAMPING: f32 = 0.5;
const WET_LEVEL: f32 = 0.33;
const DRY_LEVEL: f32 = 0.4;
const WET_SCALE: f32 = 3.0;
const DRY_SCALE: f32 = 2.0;

// ============================================================================
// Filter Components
// ============================================================================

/// Low-pass comb filter for Freeverb
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    /// One-pole low-pass memory in the feedback path
    filter_state: f32,
    feedback: f32,
    damp1: f32,
    damp2: f32,
}

impl CombFilter {
    fn new(delay: usize, feedback: f32, damp: f32) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
            filter_state: 0.0,
            feedback,
            damp1: damp,
            damp2: 1.0 - damp,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.filter_state = output * self.damp2 + self.filter_state * self.damp1;
        self.buffer[self.pos] = input + self.filter_state * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.pos = 0;
    }
}

/// Allpass filter for Freeverb diffusion
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = delayed - input;
        self.buffer[self.pos] = input + delayed * ALLPASS_GAIN;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

// ============================================================================
// Main Reverb Effect
// ============================================================================

/// Mono Freeverb reverb
#[derive(Debug, Clone)]
pub struct Reverb {
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],
}

impl Reverb {
    /// Create a reverb for `room_size` (0 = tiny, 1 = huge hall)
    pub fn new(room_size: f32, sample_rate: u32) -> Self {
        let scale = sample_rate as f32 / REFERENCE_SAMPLE_RATE;
        let scaled = |delay: usize| ((delay as f32 * scale).round() as usize).max(1);

        let feedback = room_size.clamp(0.0, 1.0) * ROOM_SCALE + ROOM_OFFSET;
        let damp = DAMPING * DAMP_SCALE;

        Self {
            combs: std::array::from_fn(|i| CombFilter::new(scaled(COMB_DELAYS[i]), feedback, damp)),
            allpasses: std::array::from_fn(|i| AllpassFilter::new(scaled(ALLPASS_DELAYS[i]))),
        }
    }
}

impl Effect for Reverb {
    fn process(&mut self, samples: &mut [f32]) {
        let wet = WET_LEVEL * WET_SCALE;
        let dry = DRY_LEVEL * DRY_SCALE;

        for sample in samples.iter_mut() {
            let input = *sample * FIXED_GAIN;
            let mut acc = 0.0;
            for comb in &mut self.combs {
                acc += comb.process(input);
            }
            for allpass in &mut self.allpasses {
                acc = allpass.process(acc);
            }
            *sample = *sample * dry + acc * wet;
        }
    }

    fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
    }

    fn effect_type(&self) -> &'static str {
        "reverb"
    }
}
