use ssvep_core::Event;
use std::collections::VecDeque;
use tracing::debug;

/// Events of the live run plus a bounded history of finished runs
#[derive(Debug)]
pub struct EventLog {
    live: Vec<Event>,
    completed: VecDeque<Vec<Event>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            live: Vec::new(),
            completed: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn begin_run(&mut self) {
        self.live.clear();
    }

    pub fn record(&mut self, event: Event) {
        self.live.push(event);
    }

    /// Moves the live list into history, evicting the oldest run when full.
    pub fn finish_run(&mut self) -> usize {
        let events = std::mem::take(&mut self.live);
        let n = events.len();
        if self.completed.len() >= self.capacity {
            self.completed.pop_front();
            debug!(capacity = self.capacity, "event history full, dropped oldest run");
        }
        self.completed.push_back(events);
        n
    }

    pub fn pop_completed(&mut self) -> Option<Vec<Event>> {
        self.completed.pop_front()
    }

    pub fn live(&self) -> &[Event] {
        &self.live
    }

    pub fn completed_runs(&self) -> usize {
        self.completed.len()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(16)
    }
}
