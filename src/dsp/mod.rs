//! Per-sample DSP primitives shared by every voice (spec.md §4.D).

pub mod envelope;
pub mod filter;
pub mod oscillator;
pub mod sampler;

pub use envelope::{Envelope, EnvelopeAdsr, EnvelopeState};
pub use filter::{filter_coefficient, OnePoleFilter};
pub use oscillator::Oscillator;
pub use sampler::Sampler;
