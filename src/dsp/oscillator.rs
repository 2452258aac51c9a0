//! Per-sample waveform generator (spec.md §4.D).

use crate::message::OscShape;
use crate::random::AudioRng;

#[derive(Debug, Clone, Copy)]
pub struct Oscillator {
    phase: f64,
    sample_interval: f64,
    frequency: f64,
}

impl Oscillator {
    pub fn new(sample_rate: i32) -> Self {
        Self {
            phase: 0.0,
            sample_interval: 1.0 / sample_rate as f64,
            frequency: 0.0,
        }
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Generates the next output sample in `[-1, 1]` for the given shape and
    /// advances `phase` by `frequency * sample_interval`, wrapping into
    /// `[0, 1)`.
    pub fn next(&mut self, shape: OscShape, rng: &mut AudioRng) -> f64 {
        let sample = match shape {
            OscShape::None => 0.0,
            OscShape::Sine => (std::f64::consts::TAU * self.phase).sin(),
            OscShape::Saw => 2.0 * self.phase - 1.0,
            OscShape::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscShape::Triangle => 4.0 * (self.phase - 0.5).abs() - 1.0,
            OscShape::Noise => rng.draw_uniform_f64(-1.0, 1.0),
        };

        let increment = self.frequency * self.sample_interval;
        self.phase = (self.phase + increment).rem_euclid(1.0);

        sample
    }
}
