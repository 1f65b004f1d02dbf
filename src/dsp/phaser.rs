//! Phaser effect implementation
//!
//! Four first-order allpass stages whose break frequency is swept by a sine
//! LFO around 1.3 kHz. The allpass output is mixed equally with the dry
//! signal, producing moving notches.

use std::f32::consts::{PI, TAU};

use super::effect::Effect;

const NUM_STAGES: usize = 4;

/// Centre of the swept break frequency in Hz
const CENTRE_FREQUENCY_HZ: f32 = 1300.0;

/// Sweep range in octaves either side of the centre at depth 1.0
const SWEEP_OCTAVES: f32 = 1.0;

const MIN_FREQUENCY_HZ: f32 = 20.0;

const MIX: f32 = 0.5;

/// Swept allpass phaser
#[derive(Debug, Clone)]
pub struct Phaser {
    /// One sample of memory per allpass stage
    stages: [f32; NUM_STAGES],
    phase: f32,
    phase_inc: f32,
    depth: f32,
    sample_rate: f32,
}

impl Phaser {
    /// Create a phaser with LFO `rate` in Hz and `depth` in [0, 1]
    pub fn new(rate: f32, depth: f32, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        Self {
            stages: [0.0; NUM_STAGES],
            phase: 0.0,
            phase_inc: rate.max(0.0) / sample_rate,
            depth: depth.clamp(0.0, 1.0),
            sample_rate,
        }
    }

    /// Allpass coefficient for the current LFO position
    #[inline]
    fn coefficient(&self, lfo: f32) -> f32 {
        let nyquist_guard = 0.45 * self.sample_rate;
        let freq = (CENTRE_FREQUENCY_HZ * (self.depth * SWEEP_OCTAVES * lfo).exp2())
            .min(nyquist_guard)
            .max(MIN_FREQUENCY_HZ.min(nyquist_guard));
        let t = (PI * freq / self.sample_rate).tan();
        (t - 1.0) / (t + 1.0)
    }
}

impl Effect for Phaser {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = *sample;
            let a = self.coefficient((self.phase * TAU).sin());

            let mut x = input;
            for state in &mut self.stages {
                // y[n] = a*x[n] + x[n-1] - a*y[n-1], transposed direct form
                let y = a * x + *state;
                *state = x - a * y;
                x = y;
            }

            *sample = input * (1.0 - MIX) + x * MIX;
            self.phase = (self.phase + self.phase_inc).fract();
        }
    }

    fn reset(&mut self) {
        self.stages = [0.0; NUM_STAGES];
        self.phase = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "phaser"
    }
}
