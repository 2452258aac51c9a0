//! One polyphonic voice, combining the DSP primitives in [`crate::dsp`]
//! with per-note pitch/gain state (spec.md §4.E).

use crate::dsp::{filter_coefficient, Envelope, EnvelopeAdsr, OnePoleFilter, Oscillator, Sampler};
use crate::message::{FilterType, NoteControl, NoteControlType, OscMode, OscShape, SliceMode};
use crate::random::AudioRng;
use crate::slice::{select_for_pitch, Slice};

/// `frequency = REFERENCE_FREQUENCY * 2^pitch`, matching the octave-based
/// pitch convention in spec.md §6 (pitch `0.0` is the reference pitch).
pub const REFERENCE_FREQUENCY: f64 = 440.0;

pub fn pitch_to_frequency(pitch: f64) -> f64 {
    REFERENCE_FREQUENCY * 2f64.powf(pitch)
}

/// Parameters shared by every voice of an instrument, read fresh each
/// sample. Lazily-propagated per spec.md §4.F: the processor bumps these
/// values when a `ControlChange` message is applied, and every voice reads
/// the latest value on its next sample without an explicit broadcast.
pub struct VoiceParams<'a> {
    pub sample_rate: i32,
    pub dst_sample_interval: f64,
    pub gain: f64,
    pub pitch_shift: f64,
    pub osc_mode: OscMode,
    pub osc_shape: OscShape,
    pub osc_mix: f64,
    pub osc_pitch_shift: f64,
    pub slice_mode: SliceMode,
    pub filter_type: FilterType,
    pub filter_frequency: f64,
    pub adsr: &'a EnvelopeAdsr,
    pub slices: &'a [Slice],
    pub retrigger: bool,
}

#[derive(Debug, Clone, Copy)]
struct NoteControls {
    pitch_shift: f64,
    gain: f64,
}

impl Default for NoteControls {
    fn default() -> Self {
        Self {
            pitch_shift: 0.0,
            gain: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Voice {
    pitch: f64,
    note_controls: NoteControls,
    oscillator: Oscillator,
    envelope: Envelope,
    sampler: Sampler,
    filter: OnePoleFilter,
    age: u64,
    one_shot_release_pending: bool,
    last_envelope_value: f64,
}

impl Default for Voice {
    /// Placeholder used only to satisfy `Pool<Voice, N>::new()`'s `T: Default`
    /// bound; every slot is immediately overwritten with a real sample rate
    /// right after the pool is constructed (see `InstrumentProcessor::new`).
    fn default() -> Self {
        Self::new(0)
    }
}

impl Voice {
    pub fn new(sample_rate: i32) -> Self {
        Self {
            pitch: 0.0,
            note_controls: NoteControls::default(),
            oscillator: Oscillator::new(sample_rate),
            envelope: Envelope::new(sample_rate),
            sampler: Sampler::new(),
            filter: OnePoleFilter::new(),
            age: 0,
            one_shot_release_pending: false,
            last_envelope_value: 0.0,
        }
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    /// Amplitude as of the voice's last rendered sample, used by voice
    /// stealing to find the quietest candidate without re-advancing state.
    pub fn envelope_amplitude(&self) -> f64 {
        self.last_envelope_value
    }

    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    pub fn set_note_control(&mut self, control_type: NoteControlType, value: f64) {
        match control_type {
            NoteControlType::PitchShift => self.note_controls.pitch_shift = value,
            NoteControlType::Gain => self.note_controls.gain = value,
        }
    }

    /// Starts the voice on `pitch` with initial note controls. Resets
    /// oscillator phase (and, if `retrigger` is set, the sampler cursor and
    /// filter state) before starting the envelope.
    pub fn start(&mut self, pitch: f64, controls: &[NoteControl], retrigger: bool, age: u64) {
        self.pitch = pitch;
        self.note_controls = NoteControls::default();
        for control in controls {
            self.set_note_control(control.control_type, control.value);
        }
        self.oscillator.reset();
        if retrigger {
            self.sampler.reset();
            self.filter.reset();
        }
        self.age = age;
        self.one_shot_release_pending = false;
        self.last_envelope_value = 0.0;
        self.envelope.start();
    }

    /// Triggers release; the voice remains active until the tail completes.
    pub fn stop(&mut self, slice_mode: SliceMode) {
        if slice_mode == SliceMode::OneShot {
            self.one_shot_release_pending = true;
        } else {
            self.envelope.stop();
        }
    }

    /// Renders the next sample for this voice.
    pub fn next(&mut self, params: &VoiceParams, rng: &mut AudioRng) -> f64 {
        if !self.is_active() {
            self.last_envelope_value = 0.0;
            return 0.0;
        }

        let total_pitch_shift =
            params.pitch_shift + params.osc_pitch_shift + self.note_controls.pitch_shift;
        let frequency = pitch_to_frequency(self.pitch + total_pitch_shift);

        let slice = select_for_pitch(params.slices, self.pitch);
        let looping = params.slice_mode == SliceMode::Loop;
        let sampler_sample = slice
            .map(|slice| {
                self.sampler
                    .next(slice, 1.0, params.dst_sample_interval, looping)
            })
            .unwrap_or(0.0);

        if self.one_shot_release_pending && sampler_exhausted(slice, &self.sampler) {
            self.envelope.stop();
            self.one_shot_release_pending = false;
        }

        self.oscillator.set_frequency(match params.osc_mode {
            OscMode::Fm => frequency * (1.0 + sampler_sample),
            _ => frequency,
        });
        let osc_sample = self.oscillator.next(params.osc_shape, rng);

        let mixed = mix(params.osc_mode, osc_sample, sampler_sample, params.osc_mix);

        let coefficient = filter_coefficient(params.sample_rate, params.filter_frequency);
        let filtered = self.filter.next(mixed, coefficient, params.filter_type);

        let envelope_value = self.envelope.next(params.adsr);
        self.last_envelope_value = envelope_value;

        params.gain * self.note_controls.gain * envelope_value * filtered
    }
}

fn sampler_exhausted(slice: Option<&Slice>, sampler: &Sampler) -> bool {
    slice.is_none() || sampler.is_exhausted()
}

fn mix(mode: OscMode, osc_sample: f64, sampler_sample: f64, osc_mix: f64) -> f64 {
    match mode {
        OscMode::Mix => sampler_sample * (1.0 - osc_mix) + osc_sample * osc_mix,
        OscMode::Am => sampler_sample * (0.5 + 0.5 * osc_sample),
        OscMode::Ring => sampler_sample * osc_sample,
        OscMode::Fm => osc_sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params(adsr: &EnvelopeAdsr, slices: &[Slice]) -> VoiceParams<'_> {
        VoiceParams {
            sample_rate: 48_000,
            dst_sample_interval: 1.0 / 48_000.0,
            gain: 1.0,
            pitch_shift: 0.0,
            osc_mode: OscMode::Mix,
            osc_shape: OscShape::Sine,
            osc_mix: 1.0,
            osc_pitch_shift: 0.0,
            slice_mode: SliceMode::Sustain,
            filter_type: FilterType::None,
            filter_frequency: 20_000.0,
            adsr,
            slices,
            retrigger: true,
        }
    }

    #[test]
    fn pitch_zero_is_reference_frequency() {
        assert!((pitch_to_frequency(0.0) - REFERENCE_FREQUENCY).abs() < 1e-9);
        assert!((pitch_to_frequency(1.0) - REFERENCE_FREQUENCY * 2.0).abs() < 1e-9);
    }

    #[test]
    fn inactive_voice_is_silent() {
        let adsr = EnvelopeAdsr::default();
        let slices: Vec<Slice> = Vec::new();
        let mut voice = Voice::new(48_000);
        let mut rng = AudioRng::new(1);
        let params = default_params(&adsr, &slices);
        assert_eq!(voice.next(&params, &mut rng), 0.0);
    }

    #[test]
    fn started_voice_produces_nonzero_output() {
        let adsr = EnvelopeAdsr {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.05,
        };
        let slices: Vec<Slice> = Vec::new();
        let mut voice = Voice::new(48_000);
        let mut rng = AudioRng::new(1);
        voice.start(0.0, &[], true, 1);
        let params = default_params(&adsr, &slices);
        let mut sum = 0.0;
        for _ in 0..100 {
            sum += voice.next(&params, &mut rng).abs();
        }
        assert!(sum > 0.0);
        assert!(voice.is_active());
    }

    #[test]
    fn stop_eventually_deactivates_the_voice() {
        let adsr = EnvelopeAdsr {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.01,
        };
        let slices: Vec<Slice> = Vec::new();
        let mut voice = Voice::new(1_000);
        let mut rng = AudioRng::new(1);
        voice.start(0.0, &[], true, 1);
        let params = default_params(&adsr, &slices);
        voice.next(&params, &mut rng);
        voice.stop(SliceMode::Sustain);
        for _ in 0..20 {
            voice.next(&params, &mut rng);
        }
        assert!(!voice.is_active());
    }

    #[test]
    fn note_control_pitch_shift_changes_frequency_without_changing_base_pitch() {
        let adsr = EnvelopeAdsr::default();
        let slices: Vec<Slice> = Vec::new();
        let mut voice = Voice::new(48_000);
        voice.start(
            0.0,
            &[NoteControl {
                control_type: NoteControlType::PitchShift,
                value: 1.0,
            }],
            true,
            1,
        );
        assert_eq!(voice.pitch(), 0.0);
    }
}
