//! Public error surface for fallible control-thread operations (spec.md §7).
//!
//! Audio-thread code never returns `Result` — violations there are silent
//! no-ops or debug-assertions, never allocations, never logs (§5, §7).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum BarelyError {
    #[error("invalid argument")]
    InvalidArgument,

    #[error("instrument handle is stale or unknown")]
    UnknownInstrument,

    #[error("performer handle is stale or unknown")]
    UnknownPerformer,

    #[error("task handle is stale or unknown")]
    UnknownTask,

    #[error("instrument or performer capacity exhausted")]
    CapacityExhausted,
}
