//! Delay effect implementation
//!
//! A single feedback delay line mixed 50/50 with the dry signal.
//! The output keeps the input length: echoes that would ring past the end of
//! the buffer are dropped.

use super::effect::Effect;

/// Wet/dry mix (0.5 = equal parts)
const MIX: f32 = 0.5;

/// Feedback is kept strictly below unity so the loop always decays
const MAX_FEEDBACK: f32 = 0.99;

/// Feedback delay line
#[derive(Debug, Clone)]
pub struct Delay {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
}

impl Delay {
    /// Create a delay of `delay_time` seconds with `feedback` ratio
    pub fn new(delay_time: f32, feedback: f32, sample_rate: u32) -> Self {
        let delay_samples = ((delay_time.max(0.0) * sample_rate as f32).round() as usize).max(1);
        Self {
            buffer: vec![0.0; delay_samples],
            write_pos: 0,
            feedback: feedback.clamp(0.0, MAX_FEEDBACK),
        }
    }

    /// Delay length in samples
    pub fn delay_samples(&self) -> usize {
        self.buffer.len()
    }
}

impl Effect for Delay {
    fn process(&mut self, samples: &mut [f32]) {
        let size = self.buffer.len();
        for sample in samples.iter_mut() {
            let input = *sample;
            let delayed = self.buffer[self.write_pos];

            // Write input plus feedback into the line
            self.buffer[self.write_pos] = input + delayed * self.feedback;
            self.write_pos = (self.write_pos + 1) % size;

            *sample = input * (1.0 - MIX) + delayed * MIX;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    fn effect_type(&self) -> &'static str {
        "delay"
    }
}
