//! Beat-time scheduler of user callbacks with priorities (spec.md §4.H).
//!
//! Unlike the instrument's control/audio split, a `Performer`'s schedule and
//! its `Update` sweep are not separated by a lock-free queue: spec.md §5
//! only requires the *user* to serialize Engine calls against the audio
//! callback, so ordinary `&mut self` methods are enough here — Rust's
//! borrow checker is the serialization mechanism.

use crate::pool::Pool;

/// Default task capacity per performer.
pub const MAX_TASKS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Begin,
    End,
}

struct TaskSlot {
    position_beats: f64,
    duration_beats: f64,
    priority: i32,
    is_active: bool,
    sequence: u64,
    callback: Option<Box<dyn FnMut(TaskEvent) + Send>>,
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self {
            position_beats: 0.0,
            duration_beats: 0.0,
            priority: 0,
            is_active: false,
            sequence: 0,
            callback: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    End,
    Begin,
}

struct Event {
    position: f64,
    kind: EventKind,
    priority: i32,
    sequence: u64,
    index: u32,
}

pub struct Performer {
    is_playing: bool,
    position_beats: f64,
    loop_begin_beats: f64,
    loop_length_beats: f64,
    is_looping: bool,
    tasks: Pool<TaskSlot, MAX_TASKS>,
    allocated: [bool; MAX_TASKS],
    next_sequence: u64,
}

impl Performer {
    pub fn new() -> Self {
        Self {
            is_playing: false,
            position_beats: 0.0,
            loop_begin_beats: 0.0,
            loop_length_beats: 1.0,
            is_looping: false,
            tasks: Pool::new(),
            allocated: [false; MAX_TASKS],
            next_sequence: 0,
        }
    }

    pub fn start(&mut self) {
        self.is_playing = true;
    }

    /// Forces `End` on every active task, then stops advancing.
    pub fn stop(&mut self) {
        self.force_end_all_active();
        self.is_playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn position(&self) -> f64 {
        self.position_beats
    }

    pub fn set_position(&mut self, position_beats: f64) {
        self.position_beats = position_beats;
    }

    pub fn set_loop_begin(&mut self, loop_begin_beats: f64) {
        self.loop_begin_beats = loop_begin_beats;
    }

    pub fn set_loop_length(&mut self, loop_length_beats: f64) {
        self.loop_length_beats = loop_length_beats.max(0.0);
    }

    pub fn set_looping(&mut self, is_looping: bool) {
        self.is_looping = is_looping;
    }

    /// Creates a task, returning its handle (the pool index), or `0` if the
    /// task pool is exhausted (spec.md §7: "task pool returns invalid handle").
    pub fn create_task(
        &mut self,
        position_beats: f64,
        duration_beats: f64,
        priority: i32,
        callback: Box<dyn FnMut(TaskEvent) + Send>,
    ) -> u32 {
        let index = self.tasks.acquire();
        if index == 0 {
            return 0;
        }
        self.next_sequence += 1;
        *self.tasks.get_mut(index) = TaskSlot {
            position_beats,
            duration_beats: duration_beats.max(f64::EPSILON),
            priority,
            is_active: false,
            sequence: self.next_sequence,
            callback: Some(callback),
        };
        self.allocated[index as usize - 1] = true;
        index
    }

    /// Destroys a task. Per spec.md §9, this never fires `Begin` or `End`.
    pub fn destroy_task(&mut self, handle: u32) {
        if handle == 0 || handle as usize > MAX_TASKS || !self.allocated[handle as usize - 1] {
            return;
        }
        self.allocated[handle as usize - 1] = false;
        self.tasks.release(handle);
    }

    pub fn set_task_position(&mut self, handle: u32, position_beats: f64) {
        if let Some(slot) = self.task_slot_mut(handle) {
            slot.position_beats = position_beats;
        }
    }

    pub fn set_task_duration(&mut self, handle: u32, duration_beats: f64) {
        if let Some(slot) = self.task_slot_mut(handle) {
            slot.duration_beats = duration_beats.max(f64::EPSILON);
        }
    }

    pub fn set_task_priority(&mut self, handle: u32, priority: i32) {
        if let Some(slot) = self.task_slot_mut(handle) {
            slot.priority = priority;
        }
    }

    /// Replaces a task's callback (spec.md §6 `Task.SetEventCallback`).
    pub fn set_task_callback(&mut self, handle: u32, callback: Box<dyn FnMut(TaskEvent) + Send>) {
        if let Some(slot) = self.task_slot_mut(handle) {
            slot.callback = Some(callback);
        }
    }

    fn task_slot_mut(&mut self, handle: u32) -> Option<&mut TaskSlot> {
        if handle == 0 || handle as usize > MAX_TASKS || !self.allocated[handle as usize - 1] {
            return None;
        }
        Some(self.tasks.get_mut(handle))
    }

    /// Sweeps `[position, next_position)`, firing task events in order, and
    /// wrapping at the loop boundary as many times as needed
    /// (spec.md §4.H).
    pub fn update(&mut self, next_position_beats: f64) {
        if !self.is_playing {
            self.position_beats = next_position_beats;
            return;
        }

        let mut target = next_position_beats;
        loop {
            let wrap_at = self.is_looping.then(|| self.loop_begin_beats + self.loop_length_beats);
            let segment_end = match wrap_at {
                Some(wrap) if target > wrap => wrap,
                _ => target,
            };
            self.sweep(segment_end);

            match wrap_at {
                Some(wrap) if target > wrap && self.loop_length_beats > 0.0 => {
                    self.force_end_all_active();
                    let overshoot = target - wrap;
                    self.position_beats = self.loop_begin_beats;
                    target = self.loop_begin_beats + overshoot;
                }
                _ => break,
            }
        }
    }

    fn sweep(&mut self, segment_end: f64) {
        loop {
            match self.find_next_event(segment_end) {
                Some(event) => {
                    self.position_beats = event.position;
                    match event.kind {
                        EventKind::Begin => self.fire_begin(event.index),
                        EventKind::End => self.fire_end(event.index),
                    }
                }
                None => {
                    self.position_beats = segment_end;
                    break;
                }
            }
        }
    }

    fn find_next_event(&self, segment_end: f64) -> Option<Event> {
        let mut best: Option<Event> = None;
        for index in 1..=MAX_TASKS as u32 {
            if !self.allocated[index as usize - 1] {
                continue;
            }
            let slot = self.tasks.get(index);
            let (position, kind) = if slot.is_active {
                (slot.position_beats + slot.duration_beats, EventKind::End)
            } else {
                (slot.position_beats, EventKind::Begin)
            };
            if position < self.position_beats || position >= segment_end {
                continue;
            }
            let candidate = Event {
                position,
                kind,
                priority: slot.priority,
                sequence: slot.sequence,
                index,
            };
            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if event_key(&candidate) < event_key(&current) {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }
        best
    }

    fn fire_begin(&mut self, index: u32) {
        let slot = self.tasks.get_mut(index);
        slot.is_active = true;
        if let Some(callback) = slot.callback.as_mut() {
            callback(TaskEvent::Begin);
        }
    }

    fn fire_end(&mut self, index: u32) {
        let slot = self.tasks.get_mut(index);
        slot.is_active = false;
        if let Some(callback) = slot.callback.as_mut() {
            callback(TaskEvent::End);
        }
    }

    fn force_end_all_active(&mut self) {
        for index in 1..=MAX_TASKS as u32 {
            if self.allocated[index as usize - 1] && self.tasks.get(index).is_active {
                self.fire_end(index);
            }
        }
    }
}

impl Default for Performer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort key: position, then End-before-Begin, then priority, then
/// insertion order (spec.md §4.H "clean-before-dirty" rule, §9 Open
/// Question (ii)).
fn event_key(event: &Event) -> (u64, u8, i32, u64) {
    (
        event.position.to_bits(),
        match event.kind {
            EventKind::End => 0,
            EventKind::Begin => 1,
        },
        event.priority,
        event.sequence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_callback(log: Arc<Mutex<Vec<(String, TaskEvent)>>>, label: &str) -> Box<dyn FnMut(TaskEvent) + Send> {
        let label = label.to_string();
        Box::new(move |event| log.lock().unwrap().push((label.clone(), event)))
    }

    #[test]
    fn s4_equal_position_fires_priority_zero_before_priority_one() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut performer = Performer::new();
        performer.start();
        performer.create_task(0.5, 0.1, 1, recording_callback(Arc::clone(&log), "low"));
        performer.create_task(0.5, 0.1, 0, recording_callback(Arc::clone(&log), "high"));

        performer.update(1.0);

        let log = log.lock().unwrap();
        let begins: Vec<_> = log.iter().filter(|(_, e)| *e == TaskEvent::Begin).collect();
        assert_eq!(begins[0].0, "high");
        assert_eq!(begins[1].0, "low");
    }

    #[test]
    fn s5_loop_fires_task_once_per_lap_across_four_beats() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut performer = Performer::new();
        performer.set_looping(true);
        performer.set_loop_begin(0.0);
        performer.set_loop_length(1.0);
        performer.start();
        performer.create_task(0.5, 0.1, 0, recording_callback(Arc::clone(&log), "tick"));

        performer.update(4.0);

        let begins = log.lock().unwrap().iter().filter(|(_, e)| *e == TaskEvent::Begin).count();
        assert_eq!(begins, 4);
    }

    #[test]
    fn end_before_begin_at_identical_positions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut performer = Performer::new();
        performer.start();
        performer.create_task(0.0, 0.5, 0, recording_callback(Arc::clone(&log), "a"));
        performer.update(0.4);
        performer.create_task(0.5, 0.5, 0, recording_callback(Arc::clone(&log), "b"));
        performer.update(0.6);

        let log = log.lock().unwrap();
        let kinds: Vec<_> = log.iter().map(|(label, e)| (label.clone(), *e)).collect();
        assert_eq!(kinds[0], ("a".to_string(), TaskEvent::Begin));
        assert_eq!(kinds[1], ("a".to_string(), TaskEvent::End));
        assert_eq!(kinds[2], ("b".to_string(), TaskEvent::Begin));
    }

    #[test]
    fn stopping_forces_end_on_active_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut performer = Performer::new();
        performer.start();
        performer.create_task(0.0, 1.0, 0, recording_callback(Arc::clone(&log), "a"));
        performer.update(0.1);
        performer.stop();

        let log = log.lock().unwrap();
        assert_eq!(log.last().unwrap(), &("a".to_string(), TaskEvent::End));
    }

    #[test]
    fn destroying_a_task_fires_neither_begin_nor_end() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut performer = Performer::new();
        performer.start();
        let handle = performer.create_task(0.5, 0.1, 0, recording_callback(Arc::clone(&log), "a"));
        performer.destroy_task(handle);
        performer.update(1.0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn set_task_callback_replaces_which_callback_fires() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut performer = Performer::new();
        performer.start();
        let handle = performer.create_task(0.5, 0.1, 0, recording_callback(Arc::clone(&log), "old"));
        performer.set_task_callback(handle, recording_callback(Arc::clone(&log), "new"));

        performer.update(1.0);

        let log = log.lock().unwrap();
        assert!(log.iter().all(|(label, _)| label == "new"));
    }
}
