//! State shared between the render thread and the control channel.

use crate::config::EngineConfig;
use crate::event_log::EventLog;
use crate::mailbox::Mailbox;
use crate::queue::TaskQueue;
use ssvep_core::{EngineState, Event};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Engine progress as published once per frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Seconds on the frame clock
    pub elapsed: f64,
    /// Run length, `None` while idle
    pub total: Option<f64>,
}

#[derive(Debug)]
pub struct EngineContext {
    pub tasks: TaskQueue,
    pub events: Mutex<EventLog>,
    pub status: Mailbox<EngineStatus>,
    pub prompt: Mailbox<String>,
    /// Overlay profile; applied on the next frame, even mid-run
    pub profile: Mailbox<BTreeMap<String, String>>,
    shutdown: AtomicBool,
}

impl EngineContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tasks: TaskQueue::new(),
            events: Mutex::new(EventLog::new(config.event_history)),
            status: Mailbox::new(),
            prompt: Mailbox::new(),
            profile: Mailbox::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn events(&self) -> MutexGuard<'_, EventLog> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Oldest finished run, removed from history
    pub fn pop_completed_events(&self) -> Option<Vec<Event>> {
        self.events().pop_completed()
    }

    pub fn current_status(&self) -> EngineStatus {
        self.status.latest().unwrap_or_default()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_is_idle() {
        let ctx = EngineContext::default();
        let status = ctx.current_status();
        assert_eq!(status.state, EngineState::Idle);
        assert_eq!(status.total, None);
        assert!(ctx.pop_completed_events().is_none());
        assert!(!ctx.is_shutdown());
        ctx.request_shutdown();
        assert!(ctx.is_shutdown());
    }
}
