//! A real-time, sample-accurate music engine.
//!
//! A control thread mutates musical state — instrument parameters, notes,
//! performer schedules, tempo — while one real-time audio thread renders
//! PCM through a lock-free transport. See [`Engine`] for the entry point.

pub mod dsp;
pub mod engine;
pub mod error;
pub mod ids;
pub mod instrument;
pub mod message;
pub mod performer;
pub mod pool;
pub mod queue;
pub mod random;
pub mod slice;
pub mod transport;
pub mod voice;

pub use engine::Engine;
pub use error::BarelyError;
pub use message::{ControlType, FilterType, Message, NoteControl, NoteControlType, OscMode, OscShape, Pitch, SliceMode};
pub use performer::{Performer, TaskEvent};
pub use slice::Slice;
pub use transport::Transport;
