use ssvep_core::Task;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Unbounded FIFO between the control channel and the render thread
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, task: Task) {
        self.lock().push_back(task);
    }

    pub fn pop_if_any(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssvep_core::SsvepCommand;
    use std::sync::Arc;
    use std::thread;

    fn task(i: usize) -> Task {
        Task::StartSsvep(Box::new(SsvepCommand {
            repeats: Some(i),
            ..Default::default()
        }))
    }

    #[test]
    fn test_fifo_order() {
        let q = TaskQueue::new();
        assert!(q.pop_if_any().is_none());
        for i in 0..5 {
            q.push(task(i));
        }
        assert_eq!(q.len(), 5);
        for i in 0..5 {
            assert_eq!(q.pop_if_any(), Some(task(i)));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_concurrent_producers_never_drop() {
        let q = Arc::new(TaskQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || (0..250).for_each(|i| q.push(task(i))))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.len(), 1000);
    }
}
