//! Lock-free single-producer/single-consumer message transport (spec.md §4.A).
//!
//! One control thread calls [`MessageQueue::add`], one audio thread calls
//! [`MessageQueue::get_next`]. No allocation, no locks, no syscalls on
//! either side after construction.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::message::Message;

/// Ring capacity. Sized for human/UI-rate control traffic, not audio-rate.
pub const CAPACITY: usize = 4096;

struct Slot {
    frame: i64,
    message: Option<Message>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            frame: 0,
            message: None,
        }
    }
}

/// Bounded SPSC ring of `(frame, Message)`.
///
/// The producer reads `read_index` with acquire ordering before deciding
/// fullness and publishes with release ordering on `write_index`; the
/// consumer mirrors this with the roles swapped. Slots themselves carry no
/// atomics — ordering on the index cursors is what makes a slot write
/// visible to the other thread.
pub struct MessageQueue {
    slots: Box<[std::cell::UnsafeCell<Slot>]>,
    read_index: AtomicUsize,
    write_index: AtomicUsize,
}

// SAFETY: SPSC contract — `read_index` is only ever written by the consumer,
// `write_index` only by the producer. The acquire/release pairing below
// ensures a slot write happens-before the matching slot read.
unsafe impl Send for MessageQueue {}
unsafe impl Sync for MessageQueue {}

impl MessageQueue {
    pub fn new() -> Self {
        let slots = (0..CAPACITY)
            .map(|_| std::cell::UnsafeCell::new(Slot::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            read_index: AtomicUsize::new(0),
            write_index: AtomicUsize::new(0),
        }
    }

    /// Enqueues a message at an absolute sample frame.
    ///
    /// Returns `false` on overflow; the caller (control thread) must retry
    /// or drop rather than block. Producers must enqueue with
    /// monotonically non-decreasing frames per instrument — the queue
    /// itself only preserves FIFO order, it does not sort.
    pub fn add(&self, frame: i64, message: Message) -> bool {
        let write = self.write_index.load(Ordering::Relaxed);
        let read = self.read_index.load(Ordering::Acquire);
        let next = (write + 1) % CAPACITY;
        if next == read {
            return false;
        }
        // SAFETY: only the producer writes to `write`, and the consumer
        // has not yet advanced past it (queue is not full).
        unsafe {
            let slot = &mut *self.slots[write].get();
            slot.frame = frame;
            slot.message = Some(message);
        }
        self.write_index.store(next, Ordering::Release);
        true
    }

    /// Returns the oldest message strictly before `end_frame`, advancing the
    /// read cursor. Returns `None` if the queue is empty or the head's frame
    /// is `>= end_frame`.
    pub fn get_next(&self, end_frame: i64) -> Option<(i64, Message)> {
        let read = self.read_index.load(Ordering::Relaxed);
        let write = self.write_index.load(Ordering::Acquire);
        if read == write {
            return None;
        }
        // SAFETY: only the consumer reads slot `read`, and the producer has
        // published it (write has advanced past read).
        let frame = unsafe { (*self.slots[read].get()).frame };
        if frame >= end_frame {
            return None;
        }
        let message = unsafe { (*self.slots[read].get()).message.take() };
        self.read_index.store((read + 1) % CAPACITY, Ordering::Release);
        Some((frame, message.expect("queued slot missing message")))
    }

    /// Peeks the frame of the head message, without consuming it.
    pub fn peek_frame(&self) -> Option<i64> {
        let read = self.read_index.load(Ordering::Relaxed);
        let write = self.write_index.load(Ordering::Acquire);
        if read == write {
            return None;
        }
        // SAFETY: read-only peek of a published slot.
        Some(unsafe { (*self.slots[read].get()).frame })
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
