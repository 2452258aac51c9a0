//! One-pole low/high-pass filter (spec.md §4.D).
//!
//! Formula preserved verbatim from the original `GetFilterCoefficient`
//! (`src/dsp/one_pole_filter.cpp` in the retrieval pack's original-source
//! material): `c = clamp(exp(-2*pi*fc/fs), 0, 1)`. Open Question (i) in
//! spec.md §9 flags this as unverified upstream; we keep the formula as-is
//! rather than "fixing" it.

use crate::message::FilterType;

#[derive(Debug, Clone, Copy, Default)]
pub struct OnePoleFilter {
    output: f64,
}

impl OnePoleFilter {
    pub fn new() -> Self {
        Self { output: 0.0 }
    }

    pub fn reset(&mut self) {
        self.output = 0.0;
    }

    pub fn next(&mut self, input: f64, coefficient: f64, filter_type: FilterType) -> f64 {
        if filter_type == FilterType::None {
            return input;
        }
        self.output = coefficient * (self.output - input) + input;
        match filter_type {
            FilterType::HighPass => input - self.output,
            _ => self.output,
        }
    }
}

/// `c = clamp(exp(-2*pi*fc/fs), 0, 1)`; `0` when `sample_rate <= 0` or
/// `cutoff_frequency >= sample_rate`.
pub fn filter_coefficient(sample_rate: i32, cutoff_frequency: f64) -> f64 {
    let sample_rate = sample_rate as f64;
    if sample_rate <= 0.0 || cutoff_frequency >= sample_rate {
        return 0.0;
    }
    (-std::f64::consts::TAU * cutoff_frequency / sample_rate)
        .exp()
        .clamp(0.0, 1.0)
}
