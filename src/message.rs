//! Wire types carried across the control → audio [`crate::queue::MessageQueue`].

use std::sync::Arc;

use derive_new::new;

use crate::slice::Slice;

/// Pitch is a continuous value in octaves, where `0.0` is the reference
/// pitch and `1.0` is one octave up, matching the note-control model in
/// spec.md §6 (no MIDI note numbers anywhere in this crate).
pub type Pitch = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Gain,
    PitchShift,
    OscMix,
    OscMode,
    OscShape,
    OscPitchShift,
    SliceMode,
    FilterType,
    FilterFrequency,
    FilterQ,
    Attack,
    Decay,
    Sustain,
    Release,
    VoiceCount,
    Retrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteControlType {
    PitchShift,
    Gain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OscMode {
    #[default]
    Mix,
    Am,
    Fm,
    Ring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OscShape {
    #[default]
    None,
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliceMode {
    #[default]
    Sustain,
    Loop,
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    None,
    LowPass,
    HighPass,
}

/// A single note-on control value, carried with the `NoteOn` message so the
/// voice starts with the correct per-note state from its very first sample.
#[derive(Debug, Clone, Copy, new)]
pub struct NoteControl {
    pub control_type: NoteControlType,
    pub value: f64,
}

/// Sum type dispatched by the [`crate::instrument::processor::InstrumentProcessor`].
///
/// Kept as a plain tagged enum rather than a trait object — no vtables on
/// the audio path (spec.md §9 "Dispatch on message variant").
#[derive(Debug, Clone)]
pub enum Message {
    ControlChange(ControlType, f64),
    NoteControlChange(Pitch, NoteControlType, f64),
    NoteOff(Pitch),
    NoteOn(Pitch, Vec<NoteControl>),
    SampleData(Arc<[Slice]>),
}
