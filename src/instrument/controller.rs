//! Control-thread half of an instrument (spec.md §4.G).
//!
//! Validates inputs, mirrors the active-note set so `IsNoteOn`/`SetNoteControl`
//! never need to ask the audio thread anything, and turns each call into a
//! frame-stamped [`Message`] pushed into the shared [`MessageQueue`].

use std::sync::Arc;

use tracing::warn;

use crate::error::BarelyError;
use crate::message::{ControlType, Message, NoteControl, NoteControlType, Pitch};
use crate::queue::MessageQueue;
use crate::slice::Slice;

pub struct InstrumentController {
    queue: Arc<MessageQueue>,
    sample_rate: i32,
    active_notes: Vec<Pitch>,
}

impl InstrumentController {
    pub fn new(sample_rate: i32, queue: Arc<MessageQueue>) -> Self {
        Self {
            queue,
            sample_rate,
            active_notes: Vec::new(),
        }
    }

    fn message_frame(&self, timestamp_seconds: f64, delay_seconds: f64) -> i64 {
        ((timestamp_seconds + delay_seconds) * self.sample_rate as f64).round() as i64
    }

    fn enqueue(&self, frame: i64, message: Message) -> Result<(), BarelyError> {
        if self.queue.add(frame, message) {
            Ok(())
        } else {
            warn!("instrument message queue is full, dropping message");
            Err(BarelyError::CapacityExhausted)
        }
    }

    pub fn set_control(
        &self,
        control_type: ControlType,
        value: f64,
        timestamp_seconds: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        if !value.is_finite() {
            return Err(BarelyError::InvalidArgument);
        }
        let frame = self.message_frame(timestamp_seconds, delay_seconds);
        self.enqueue(frame, Message::ControlChange(control_type, value))
    }

    pub fn set_note_on(
        &mut self,
        pitch: Pitch,
        controls: Vec<NoteControl>,
        timestamp_seconds: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        if !pitch.is_finite() || controls.iter().any(|c| !c.value.is_finite()) {
            return Err(BarelyError::InvalidArgument);
        }
        let frame = self.message_frame(timestamp_seconds, delay_seconds);
        self.enqueue(frame, Message::NoteOn(pitch, controls))?;
        self.active_notes.retain(|p| *p != pitch);
        self.active_notes.push(pitch);
        Ok(())
    }

    pub fn set_note_off(
        &mut self,
        pitch: Pitch,
        timestamp_seconds: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        if !self.is_note_on(pitch) {
            return Ok(());
        }
        let frame = self.message_frame(timestamp_seconds, delay_seconds);
        self.enqueue(frame, Message::NoteOff(pitch))?;
        self.active_notes.retain(|p| *p != pitch);
        Ok(())
    }

    pub fn set_note_control(
        &self,
        pitch: Pitch,
        control_type: NoteControlType,
        value: f64,
        timestamp_seconds: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        if !value.is_finite() || !self.is_note_on(pitch) {
            return Err(BarelyError::InvalidArgument);
        }
        let frame = self.message_frame(timestamp_seconds, delay_seconds);
        self.enqueue(frame, Message::NoteControlChange(pitch, control_type, value))
    }

    pub fn set_all_notes_off(
        &mut self,
        timestamp_seconds: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        let frame = self.message_frame(timestamp_seconds, delay_seconds);
        for pitch in std::mem::take(&mut self.active_notes) {
            self.enqueue(frame, Message::NoteOff(pitch))?;
        }
        Ok(())
    }

    pub fn set_sample_data(
        &self,
        slices: Arc<[Slice]>,
        timestamp_seconds: f64,
        delay_seconds: f64,
    ) -> Result<(), BarelyError> {
        let frame = self.message_frame(timestamp_seconds, delay_seconds);
        self.enqueue(frame, Message::SampleData(slices))
    }

    pub fn is_note_on(&self, pitch: Pitch) -> bool {
        self.active_notes.contains(&pitch)
    }
}
