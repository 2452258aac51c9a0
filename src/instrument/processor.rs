//! Audio-thread half of an instrument (spec.md §4.F).
//!
//! Owns the voice bank, the instrument parameter block, and the live slice
//! table. Holds no locks; every mutation originates from draining its
//! [`MessageQueue`].

use std::sync::Arc;

use crate::dsp::EnvelopeAdsr;
use crate::message::{ControlType, FilterType, Message, NoteControlType, OscMode, OscShape, Pitch, SliceMode};
use crate::pool::Pool;
use crate::queue::MessageQueue;
use crate::random::AudioRng;
use crate::slice::Slice;
use crate::voice::{Voice, VoiceParams};

/// Default voice-bank size (spec.md §4.F: "default 32 voices").
pub const MAX_VOICES: usize = 32;

#[derive(Debug, Clone)]
struct Params {
    gain: f64,
    pitch_shift: f64,
    osc_mode: OscMode,
    osc_shape: OscShape,
    osc_mix: f64,
    osc_pitch_shift: f64,
    slice_mode: SliceMode,
    filter_type: FilterType,
    filter_frequency: f64,
    adsr: EnvelopeAdsr,
    retrigger: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pitch_shift: 0.0,
            osc_mode: OscMode::default(),
            osc_shape: OscShape::default(),
            osc_mix: 1.0,
            osc_pitch_shift: 0.0,
            slice_mode: SliceMode::default(),
            filter_type: FilterType::default(),
            filter_frequency: 20_000.0,
            adsr: EnvelopeAdsr::default(),
            retrigger: false,
        }
    }
}

pub struct InstrumentProcessor {
    sample_rate: i32,
    dst_sample_interval: f64,
    queue: Arc<MessageQueue>,
    params: Params,
    slices: Arc<[Slice]>,
    voices: Pool<Voice, MAX_VOICES>,
    allocated: [bool; MAX_VOICES],
    pitch_to_voice: Vec<(Pitch, u32)>,
    next_age: u64,
}

impl InstrumentProcessor {
    pub fn new(sample_rate: i32, queue: Arc<MessageQueue>) -> Self {
        let mut voices: Pool<Voice, MAX_VOICES> = Pool::new();
        for index in 1..=MAX_VOICES as u32 {
            *voices.get_mut(index) = Voice::new(sample_rate);
        }
        Self {
            sample_rate,
            dst_sample_interval: 1.0 / sample_rate as f64,
            queue,
            params: Params::default(),
            slices: Arc::from(Vec::new()),
            voices,
            allocated: [false; MAX_VOICES],
            pitch_to_voice: Vec::with_capacity(MAX_VOICES),
            next_age: 0,
        }
    }

    /// Renders `frames` frames of interleaved `channels`-channel audio,
    /// draining queued messages in timestamp order and splitting the
    /// buffer at each message's frame (spec.md §4.F). Mixes additively into
    /// `out` — callers rendering more than one instrument into the same
    /// buffer must zero it first (spec.md §4.J step 3).
    pub fn process(
        &mut self,
        out: &mut [f32],
        channels: usize,
        frames: usize,
        begin_frame: i64,
        rng: &mut AudioRng,
    ) {
        let end_frame = begin_frame + frames as i64;
        let mut cursor = 0usize;
        while let Some((frame, message)) = self.queue.get_next(end_frame) {
            let local = (frame - begin_frame).clamp(0, frames as i64) as usize;
            self.render_range(out, channels, cursor, local, rng);
            self.apply_message(message);
            cursor = local;
        }
        self.render_range(out, channels, cursor, frames, rng);
        self.reclaim_finished_voices();
    }

    fn render_range(
        &mut self,
        out: &mut [f32],
        channels: usize,
        start: usize,
        end: usize,
        rng: &mut AudioRng,
    ) {
        for frame in start..end {
            let mut sample = 0.0f64;
            for index in 1..=MAX_VOICES as u32 {
                if !self.allocated[index as usize - 1] {
                    continue;
                }
                let params = VoiceParams {
                    sample_rate: self.sample_rate,
                    dst_sample_interval: self.dst_sample_interval,
                    gain: self.params.gain,
                    pitch_shift: self.params.pitch_shift,
                    osc_mode: self.params.osc_mode,
                    osc_shape: self.params.osc_shape,
                    osc_mix: self.params.osc_mix,
                    osc_pitch_shift: self.params.osc_pitch_shift,
                    slice_mode: self.params.slice_mode,
                    filter_type: self.params.filter_type,
                    filter_frequency: self.params.filter_frequency,
                    adsr: &self.params.adsr,
                    slices: &self.slices,
                    retrigger: self.params.retrigger,
                };
                sample += self.voices.get_mut(index).next(&params, rng);
            }
            let sample = sample as f32;
            for channel in 0..channels {
                // Additive: multiple instruments mix into the same
                // host-provided buffer (spec.md §4.J step 3).
                out[frame * channels + channel] += sample;
            }
        }
    }

    fn apply_message(&mut self, message: Message) {
        match message {
            Message::ControlChange(control_type, value) => self.apply_control(control_type, value),
            Message::NoteControlChange(pitch, control_type, value) => {
                if let Some(&(_, index)) = self.pitch_to_voice.iter().find(|(p, _)| *p == pitch) {
                    self.voices.get_mut(index).set_note_control(control_type, value);
                }
            }
            Message::NoteOff(pitch) => self.note_off(pitch),
            Message::NoteOn(pitch, controls) => self.note_on(pitch, &controls),
            Message::SampleData(slices) => self.slices = slices,
        }
    }

    fn apply_control(&mut self, control_type: ControlType, value: f64) {
        match control_type {
            ControlType::Gain => self.params.gain = value,
            ControlType::PitchShift => self.params.pitch_shift = value,
            ControlType::OscMix => self.params.osc_mix = value,
            ControlType::OscMode => self.params.osc_mode = osc_mode_from_f64(value),
            ControlType::OscShape => self.params.osc_shape = osc_shape_from_f64(value),
            ControlType::OscPitchShift => self.params.osc_pitch_shift = value,
            ControlType::SliceMode => self.params.slice_mode = slice_mode_from_f64(value),
            ControlType::FilterType => self.params.filter_type = filter_type_from_f64(value),
            ControlType::FilterFrequency => self.params.filter_frequency = value,
            ControlType::FilterQ => {}
            ControlType::Attack => self.params.adsr.attack = value,
            ControlType::Decay => self.params.adsr.decay = value,
            ControlType::Sustain => self.params.adsr.sustain = value,
            ControlType::Release => self.params.adsr.release = value,
            ControlType::VoiceCount => {}
            ControlType::Retrigger => self.params.retrigger = value != 0.0,
        }
    }

    fn note_on(&mut self, pitch: Pitch, controls: &[crate::message::NoteControl]) {
        let index = self.allocate_voice(pitch);
        self.next_age += 1;
        let age = self.next_age;
        self.pitch_to_voice.retain(|(p, _)| *p != pitch);
        self.pitch_to_voice.push((pitch, index));
        self.voices
            .get_mut(index)
            .start(pitch, controls, self.params.retrigger, age);
    }

    fn note_off(&mut self, pitch: Pitch) {
        if let Some(position) = self.pitch_to_voice.iter().position(|(p, _)| *p == pitch) {
            let (_, index) = self.pitch_to_voice.remove(position);
            self.voices.get_mut(index).stop(self.params.slice_mode);
        }
    }

    /// Returns an inactive voice index if one is free, reuses the existing
    /// voice for `pitch` when retriggering, or steals the quietest active
    /// voice (oldest on ties) otherwise.
    fn allocate_voice(&mut self, pitch: Pitch) -> u32 {
        if self.params.retrigger {
            if let Some(&(_, index)) = self.pitch_to_voice.iter().find(|(p, _)| *p == pitch) {
                return index;
            }
        }
        let index = self.voices.acquire();
        if index != 0 {
            self.allocated[index as usize - 1] = true;
            return index;
        }
        self.steal_quietest_voice()
    }

    fn steal_quietest_voice(&mut self) -> u32 {
        let mut best: Option<(u32, f64, u64)> = None;
        for index in 1..=MAX_VOICES as u32 {
            if !self.allocated[index as usize - 1] {
                continue;
            }
            let voice = self.voices.get(index);
            if !voice.is_active() {
                continue;
            }
            let amplitude = voice.envelope_amplitude();
            let age = voice.age();
            let is_better = match best {
                None => true,
                Some((_, best_amplitude, best_age)) => {
                    amplitude < best_amplitude || (amplitude == best_amplitude && age < best_age)
                }
            };
            if is_better {
                best = Some((index, amplitude, age));
            }
        }
        let index = best.map(|(index, ..)| index).unwrap_or(1);
        self.pitch_to_voice.retain(|(_, i)| *i != index);
        index
    }

    /// Returns voice slots whose envelope has gone idle back to the pool
    /// (spec.md §4.F step 4).
    fn reclaim_finished_voices(&mut self) {
        for index in 1..=MAX_VOICES as u32 {
            let slot = index as usize - 1;
            if self.allocated[slot] && !self.voices.get(index).is_active() {
                self.allocated[slot] = false;
                self.voices.release(index);
            }
        }
    }

    pub fn is_note_on(&self, pitch: Pitch) -> bool {
        self.pitch_to_voice.iter().any(|(p, _)| *p == pitch)
    }

    pub fn active_voice_count(&self) -> usize {
        self.allocated.iter().filter(|active| **active).count()
    }
}

fn osc_mode_from_f64(value: f64) -> OscMode {
    match value.round() as i64 {
        1 => OscMode::Am,
        2 => OscMode::Fm,
        3 => OscMode::Ring,
        _ => OscMode::Mix,
    }
}

fn osc_shape_from_f64(value: f64) -> OscShape {
    match value.round() as i64 {
        1 => OscShape::Sine,
        2 => OscShape::Saw,
        3 => OscShape::Square,
        4 => OscShape::Triangle,
        5 => OscShape::Noise,
        _ => OscShape::None,
    }
}

fn slice_mode_from_f64(value: f64) -> SliceMode {
    match value.round() as i64 {
        1 => SliceMode::Loop,
        2 => SliceMode::OneShot,
        _ => SliceMode::Sustain,
    }
}

fn filter_type_from_f64(value: f64) -> FilterType {
    match value.round() as i64 {
        1 => FilterType::LowPass,
        2 => FilterType::HighPass,
        _ => FilterType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NoteControl;

    fn processor() -> (InstrumentProcessor, Arc<MessageQueue>) {
        let queue = Arc::new(MessageQueue::new());
        let processor = InstrumentProcessor::new(48_000, Arc::clone(&queue));
        (processor, queue)
    }

    #[test]
    fn s6_sub_buffer_split_silence_then_tone_from_note_on_frame() {
        let (mut processor, queue) = processor();
        queue.add(0, Message::ControlChange(ControlType::Attack, 0.0));
        queue.add(0, Message::ControlChange(ControlType::Release, 0.5));
        queue.add(0, Message::ControlChange(ControlType::OscShape, 1.0));
        queue.add(100, Message::NoteOn(0.0, Vec::new()));

        let channels = 1;
        let frames = 256;
        let mut out = vec![0.0f32; frames * channels];
        let mut rng = AudioRng::new(1);
        processor.process(&mut out, channels, frames, 0, &mut rng);

        assert!(out[0..100].iter().all(|s| *s == 0.0));
        assert!(out[100..256].iter().any(|s| *s != 0.0));
    }

    #[test]
    fn s2_voice_stealing_evicts_quietest_voice_on_33rd_note() {
        let (mut processor, queue) = processor();
        queue.add(0, Message::ControlChange(ControlType::Attack, 0.0));
        queue.add(0, Message::ControlChange(ControlType::Release, 10.0));

        for pitch in 0..33 {
            queue.add(pitch as i64, Message::NoteOn(pitch as f64, Vec::new()));
        }

        let channels = 1;
        let frames = 64;
        let mut out = vec![0.0f32; frames * channels];
        let mut rng = AudioRng::new(1);
        processor.process(&mut out, channels, frames, 0, &mut rng);

        assert_eq!(processor.active_voice_count(), MAX_VOICES);
        assert!(!processor.is_note_on(0.0), "oldest/quietest note should have been stolen");
        assert!(processor.is_note_on(32.0));
    }

    #[test]
    fn note_off_releases_voice_back_to_pool_once_envelope_is_idle() {
        let (mut processor, queue) = processor();
        queue.add(0, Message::ControlChange(ControlType::Attack, 0.0));
        queue.add(0, Message::ControlChange(ControlType::Release, 0.0));
        queue.add(0, Message::NoteOn(0.0, Vec::new()));
        queue.add(1, Message::NoteOff(0.0));

        let channels = 1;
        let frames = 32;
        let mut out = vec![0.0f32; frames * channels];
        let mut rng = AudioRng::new(1);
        processor.process(&mut out, channels, frames, 0, &mut rng);

        assert_eq!(processor.active_voice_count(), 0);
    }

    #[test]
    fn note_control_change_adjusts_only_the_targeted_voice() {
        let (mut processor, queue) = processor();
        queue.add(0, Message::ControlChange(ControlType::Attack, 0.0));
        queue.add(0, Message::ControlChange(ControlType::Release, 1.0));
        queue.add(
            0,
            Message::NoteOn(
                0.0,
                vec![NoteControl {
                    control_type: NoteControlType::Gain,
                    value: 0.5,
                }],
            ),
        );
        queue.add(1, Message::NoteControlChange(0.0, NoteControlType::Gain, 0.25));

        let channels = 1;
        let frames = 8;
        let mut out = vec![0.0f32; frames * channels];
        let mut rng = AudioRng::new(1);
        processor.process(&mut out, channels, frames, 0, &mut rng);

        assert!(processor.is_note_on(0.0));
    }
}
