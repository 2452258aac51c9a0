//! Tempo-driven musical clock, beat↔frame mapping (spec.md §4.I).
//!
//! Tempo and the play/stop flag are spec.md §5's "seqlock-like atomic
//! tempo cell" and "start/stop atomic flag" — the one piece of Transport
//! state a caller might legitimately read from one thread while another
//! writes it. `ArcSwap` gives the tempo cell that without a lock, mirroring
//! the teacher's `ArcSwap<T>` state-cell pattern (`audio/pipewire.rs`).
//! Position and timestamp are advanced only from inside `Engine::process`
//! and need no atomics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

pub struct Transport {
    sample_rate: i32,
    tempo_bpm: ArcSwap<f64>,
    is_playing: AtomicBool,
    timestamp_seconds: f64,
    position_beats: f64,
}

impl Transport {
    pub fn new(sample_rate: i32) -> Self {
        Self {
            sample_rate,
            tempo_bpm: ArcSwap::new(Arc::new(120.0)),
            is_playing: AtomicBool::new(false),
            timestamp_seconds: 0.0,
            position_beats: 0.0,
        }
    }

    pub fn tempo_bpm(&self) -> f64 {
        **self.tempo_bpm.load()
    }

    /// Negative tempo is clamped to zero (spec.md §3 invariant: `tempo ≥ 0`).
    pub fn set_tempo(&self, tempo_bpm: f64) {
        self.tempo_bpm.store(Arc::new(tempo_bpm.max(0.0)));
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Acquire)
    }

    pub fn set_playing(&self, is_playing: bool) {
        self.is_playing.store(is_playing, Ordering::Release);
    }

    pub fn timestamp_seconds(&self) -> f64 {
        self.timestamp_seconds
    }

    /// Resynchronizes the clock to a host-supplied timestamp (e.g. the
    /// audio device's DAC time passed into `Engine::process`), tolerating
    /// drift between calls. Beat position still advances purely from the
    /// frame count in [`Transport::advance`].
    pub fn sync_timestamp(&mut self, timestamp_seconds: f64) {
        self.timestamp_seconds = timestamp_seconds;
    }

    pub fn position_beats(&self) -> f64 {
        self.position_beats
    }

    fn beats_per_frame(&self) -> f64 {
        self.tempo_bpm() / (60.0 * self.sample_rate as f64)
    }

    /// `beats_per_frame = bpm / (60 * sr)`; advances `timestamp_seconds` by
    /// `frames / sr` and `position_beats` by `frames * beats_per_frame`.
    pub fn advance(&mut self, frames: i64) {
        self.timestamp_seconds += frames as f64 / self.sample_rate as f64;
        self.position_beats += frames as f64 * self.beats_per_frame();
    }

    /// Beats the transport would reach after advancing by `frames`, without
    /// mutating state (used by the Engine to drive `Performer::update`).
    pub fn position_after(&self, frames: i64) -> f64 {
        self.position_beats + frames as f64 * self.beats_per_frame()
    }
}
