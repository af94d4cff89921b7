use std::sync::{Mutex, PoisonError, TryLockError};

/// Single-slot, last-write-wins cell with a version counter.
///
/// The render thread only uses [`Mailbox::offer`] and [`Mailbox::try_read_newer`],
/// which never wait on the lock.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
}

#[derive(Debug)]
struct Slot<T> {
    version: u64,
    value: Option<T>,
}

impl<T: Clone> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                version: 0,
                value: None,
            }),
        }
    }

    pub fn post(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.version += 1;
        slot.value = Some(value);
    }

    /// Non-blocking post; returns false if the slot was busy
    pub fn offer(&self, value: T) -> bool {
        match self.slot.try_lock() {
            Ok(mut slot) => {
                slot.version += 1;
                slot.value = Some(value);
                true
            }
            Err(TryLockError::Poisoned(p)) => {
                let mut slot = p.into_inner();
                slot.version += 1;
                slot.value = Some(value);
                true
            }
            Err(TryLockError::WouldBlock) => false,
        }
    }

    pub fn latest(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).version
    }

    /// Returns the value if it changed since `seen`, updating `seen`.
    /// A busy slot reads as unchanged.
    pub fn try_read_newer(&self, seen: &mut u64) -> Option<T> {
        let slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        if slot.version <= *seen {
            return None;
        }
        *seen = slot.version;
        slot.value.clone()
    }
}

impl<T: Clone> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
