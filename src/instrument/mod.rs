//! One instrument, split across the control/audio thread boundary
//! (spec.md §4.F, §4.G).

pub mod controller;
pub mod processor;

pub use controller::InstrumentController;
pub use processor::{InstrumentProcessor, MAX_VOICES};
