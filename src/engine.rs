//! Top-level container owning instruments, performers, and the transport
//! (spec.md §4.J).
//!
//! `Engine` is called from whichever thread the host chooses; `&mut self`
//! is Rust's stand-in for spec.md §5's "user serializes Engine calls
//! externally" — there is nothing to lock inside `Engine` itself beyond the
//! per-instrument [`MessageQueue`], which is the one structure genuinely
//! shared between a real control thread and a real audio thread.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::BarelyError;
use crate::ids::IdGenerator;
use crate::instrument::{InstrumentController, InstrumentProcessor};
use crate::message::{ControlType, NoteControl, NoteControlType, Pitch};
use crate::performer::{Performer, TaskEvent};
use crate::queue::MessageQueue;
use crate::random::AudioRng;
use crate::slice::Slice;
use crate::transport::Transport;

struct InstrumentEntry {
    controller: InstrumentController,
    processor: InstrumentProcessor,
}

pub struct Engine {
    sample_rate: i32,
    transport: Transport,
    instrument_ids: IdGenerator,
    performer_ids: IdGenerator,
    instruments: HashMap<u64, InstrumentEntry>,
    performers: HashMap<u64, Performer>,
    audio_rng: AudioRng,
}

impl Engine {
    pub fn new(sample_rate: i32) -> Self {
        info!(sample_rate, "creating engine");
        Self {
            sample_rate,
            transport: Transport::new(sample_rate),
            instrument_ids: IdGenerator::new(),
            performer_ids: IdGenerator::new(),
            instruments: HashMap::new(),
            performers: HashMap::new(),
            audio_rng: AudioRng::new(sample_rate as u64),
        }
    }

    pub fn sample_rate(&self) -> i32 {
        self.sample_rate
    }

    pub fn get_tempo(&self) -> f64 {
        self.transport.tempo_bpm()
    }

    pub fn set_tempo(&mut self, tempo_bpm: f64) {
        self.transport.set_tempo(tempo_bpm);
    }

    pub fn position_beats(&self) -> f64 {
        self.transport.position_beats()
    }

    /// Control-thread convenience: advances the transport when no audio
    /// callback is running (spec.md §6 `Engine.Update`).
    pub fn update(&mut self, timestamp_seconds: f64) {
        let delta_seconds = timestamp_seconds - self.transport.timestamp_seconds();
        let frames = (delta_seconds * self.sample_rate as f64).round() as i64;
        if frames > 0 {
            self.transport.advance(frames);
        }
    }

    // -- Instruments ---------------------------------------------------

    pub fn create_instrument(&mut self) -> u64 {
        let handle = self.instrument_ids.next();
        let queue = Arc::new(MessageQueue::new());
        let controller = InstrumentController::new(self.sample_rate, Arc::clone(&queue));
        let processor = InstrumentProcessor::new(self.sample_rate, queue);
        self.instruments.insert(handle, InstrumentEntry { controller, processor });
        debug!(handle, "created instrument");
        handle
    }

    pub fn destroy_instrument(&mut self, handle: u64) {
        if self.instruments.remove(&handle).is_some() {
            debug!(handle, "destroyed instrument");
        }
    }

    pub fn set_instrument_control(
        &mut self,
        handle: u64,
        control_type: ControlType,
        value: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        let timestamp = self.transport.timestamp_seconds();
        self.instrument_mut(handle)?
            .controller
            .set_control(control_type, value, timestamp, delay_seconds)
    }

    pub fn set_note_on(
        &mut self,
        handle: u64,
        pitch: Pitch,
        controls: Vec<NoteControl>,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        let timestamp = self.transport.timestamp_seconds();
        self.instrument_mut(handle)?
            .controller
            .set_note_on(pitch, controls, timestamp, delay_seconds)
    }

    pub fn set_note_off(&mut self, handle: u64, pitch: Pitch, delay_seconds: f64) -> Result<(), BarelyError> {
        let timestamp = self.transport.timestamp_seconds();
        self.instrument_mut(handle)?
            .controller
            .set_note_off(pitch, timestamp, delay_seconds)
    }

    pub fn set_note_control(
        &mut self,
        handle: u64,
        pitch: Pitch,
        control_type: NoteControlType,
        value: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        let timestamp = self.transport.timestamp_seconds();
        self.instrument_mut(handle)?
            .controller
            .set_note_control(pitch, control_type, value, timestamp, delay_seconds)
    }

    pub fn set_all_notes_off(&mut self, handle: u64, delay_seconds: f64) -> Result<(), BarelyError> {
        let timestamp = self.transport.timestamp_seconds();
        self.instrument_mut(handle)?
            .controller
            .set_all_notes_off(timestamp, delay_seconds)
    }

    pub fn set_sample_data(
        &mut self,
        handle: u64,
        slices: Arc<[Slice]>,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        let timestamp = self.transport.timestamp_seconds();
        self.instrument_mut(handle)?
            .controller
            .set_sample_data(slices, timestamp, delay_seconds)
    }

    pub fn is_note_on(&self, handle: u64, pitch: Pitch) -> bool {
        self.instruments
            .get(&handle)
            .map(|entry| entry.controller.is_note_on(pitch))
            .unwrap_or(false)
    }

    fn instrument_mut(&mut self, handle: u64) -> Result<&mut InstrumentEntry, BarelyError> {
        self.instruments.get_mut(&handle).ok_or(BarelyError::UnknownInstrument)
    }

    // -- Performers ------------------------------------------------------

    pub fn create_performer(&mut self) -> u64 {
        let handle = self.performer_ids.next();
        self.performers.insert(handle, Performer::new());
        debug!(handle, "created performer");
        handle
    }

    pub fn destroy_performer(&mut self, handle: u64) {
        if self.performers.remove(&handle).is_some() {
            debug!(handle, "destroyed performer");
        }
    }

    pub fn performer_mut(&mut self, handle: u64) -> Result<&mut Performer, BarelyError> {
        self.performers.get_mut(&handle).ok_or(BarelyError::UnknownPerformer)
    }

    pub fn create_task(
        &mut self,
        performer: u64,
        position_beats: f64,
        duration_beats: f64,
        priority: i32,
        callback: Box<dyn FnMut(TaskEvent) + Send>,
    ) -> Result<u32, BarelyError> {
        Ok(self
            .performer_mut(performer)?
            .create_task(position_beats, duration_beats, priority, callback))
    }

    pub fn destroy_task(&mut self, performer: u64, task: u32) -> Result<(), BarelyError> {
        self.performer_mut(performer)?.destroy_task(task);
        Ok(())
    }

    // -- Process ----------------------------------------------------------

    /// Audio-thread entry point (spec.md §4.J): advances every performer,
    /// renders every instrument additively into `out`, then advances the
    /// transport.
    pub fn process(&mut self, out: &mut [f32], channels: usize, frames: usize, timestamp_seconds: f64) {
        self.transport.sync_timestamp(timestamp_seconds);
        let begin_frame = (timestamp_seconds * self.sample_rate as f64).round() as i64;
        let end_beats = self.transport.position_after(frames as i64);

        for performer in self.performers.values_mut() {
            performer.update(end_beats);
        }

        out.fill(0.0);
        for entry in self.instruments.values_mut() {
            entry
                .processor
                .process(out, channels, frames, begin_frame, &mut self.audio_rng);
        }

        self.transport.advance(frames as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_instrument_then_destroy_makes_handle_invalid() {
        let mut engine = Engine::new(48_000);
        let handle = engine.create_instrument();
        assert!(engine.set_instrument_control(handle, ControlType::Gain, 0.5, 0.0).is_ok());
        engine.destroy_instrument(handle);
        assert_eq!(
            engine.set_instrument_control(handle, ControlType::Gain, 0.5, 0.0),
            Err(BarelyError::UnknownInstrument)
        );
    }

    #[test]
    fn process_advances_transport_by_the_requested_frames() {
        let mut engine = Engine::new(48_000);
        engine.set_tempo(120.0);
        let mut out = vec![0.0f32; 48_000];
        engine.process(&mut out, 1, 48_000, 0.0);
        assert!((engine.transport.position_beats() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_performer_handle_is_rejected() {
        let mut engine = Engine::new(48_000);
        let result = engine.create_task(999, 0.0, 1.0, 0, Box::new(|_| {}));
        assert_eq!(result, Err(BarelyError::UnknownPerformer));
    }

    #[test]
    fn note_on_then_process_produces_sound_from_a_created_instrument() {
        let mut engine = Engine::new(48_000);
        let instrument = engine.create_instrument();
        engine
            .set_instrument_control(instrument, ControlType::Attack, 0.0, 0.0)
            .unwrap();
        engine
            .set_instrument_control(instrument, ControlType::Release, 0.2, 0.0)
            .unwrap();
        engine
            .set_instrument_control(instrument, ControlType::OscShape, 1.0, 0.0)
            .unwrap();
        engine.set_note_on(instrument, 0.0, Vec::new(), 0.0).unwrap();

        let mut out = vec![0.0f32; 512];
        engine.process(&mut out, 1, 512, 0.0);

        assert!(out.iter().any(|s| *s != 0.0));
        assert!(engine.is_note_on(instrument, 0.0));
    }
}
