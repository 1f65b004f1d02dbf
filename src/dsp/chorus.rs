//! Chorus effect implementation
//!
//! A single voice read from a delay line whose length is swept by a sine
//! LFO around a 7 ms centre, mixed equally with the dry signal.

use std::f32::consts::TAU;

use super::effect::Effect;

/// Centre of the modulated delay in milliseconds
const CENTRE_DELAY_MS: f32 = 7.0;

/// Modulation excursion at depth 1.0, in milliseconds
const MAX_DEPTH_MS: f32 = 5.0;

const MIX: f32 = 0.5;

/// Modulated-delay chorus
#[derive(Debug, Clone)]
pub struct Chorus {
    buffer: Vec<f32>,
    write_pos: usize,
    /// LFO phase in cycles, kept in [0, 1)
    phase: f32,
    phase_inc: f32,
    centre_samples: f32,
    depth_samples: f32,
}

impl Chorus {
    /// Create a chorus with LFO `rate` in Hz and `depth` in [0, 1]
    pub fn new(rate: f32, depth: f32, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let centre_samples = CENTRE_DELAY_MS * 0.001 * sr;
        let depth_samples = depth.clamp(0.0, 1.0) * MAX_DEPTH_MS * 0.001 * sr;
        let size = (centre_samples + depth_samples).ceil() as usize + 2;

        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            phase: 0.0,
            phase_inc: rate.max(0.0) / sr,
            centre_samples,
            depth_samples,
        }
    }

    /// Linear-interpolated read `delay` samples behind the write head
    #[inline]
    fn read(&self, delay: f32) -> f32 {
        let size = self.buffer.len();
        let mut pos = self.write_pos as f32 - delay;
        if pos < 0.0 {
            pos += size as f32;
        }
        let idx = pos.floor() as usize % size;
        let frac = pos - pos.floor();
        let next = (idx + 1) % size;
        self.buffer[idx] * (1.0 - frac) + self.buffer[next] * frac
    }
}

impl Effect for Chorus {
    fn process(&mut self, samples: &mut [f32]) {
        let max_delay = (self.buffer.len() - 2) as f32;
        for sample in samples.iter_mut() {
            let input = *sample;
            self.buffer[self.write_pos] = input;

            let lfo = (self.phase * TAU).sin();
            let delay = (self.centre_samples + self.depth_samples * lfo).clamp(0.0, max_delay);
            let wet = self.read(delay);

            *sample = input * (1.0 - MIX) + wet * MIX;

            self.write_pos = (self.write_pos + 1) % self.buffer.len();
            self.phase = (self.phase + self.phase_inc).fract();
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "chorus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_passes_through_after_settling() {
        let mut chorus = Chorus::new(2.0, 0.5, 44100);
        let mut samples = vec![0.4; 4410];
        chorus.process(&mut samples);
        // Once the line is full, wet and dry are both 0.4
        assert!(samples[4000..].iter().all(|&s| (s - 0.4).abs() < 1e-4));
    }

    #[test]
    fn test_first_samples_are_half_dry() {
        let mut chorus = Chorus::new(1.0, 0.1, 44100);
        let mut samples = vec![1.0; 4];
        chorus.process(&mut samples);
        assert!((samples[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_modulation_changes_signal() {
        let mut chorus = Chorus::new(4.0, 0.7, 8000);
        let mut samples: Vec<f32> = (0..8000)
            .map(|i| (i as f32 * 0.3).sin())
            .collect();
        let original = samples.clone();
        chorus.process(&mut samples);
        let diff: f32 = samples
            .iter()
            .zip(&original)
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 1.0);
    }
}
