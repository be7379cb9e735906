use std::cell::Cell;
use std::rc::Rc;

/// The re-entrancy flag shared by the selection and visibility engines.
///
/// Cloning a lock shares the flag. A top-level sync entry point acquires it for its whole
/// duration; a nested call made while it is held (typically from a host callback fired by the
/// outer call) is turned away.
#[derive(Debug, Clone, Default)]
pub struct SyncLock {
    in_progress: Rc<Cell<bool>>,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Return
    ///
    /// Returns a guard releasing the lock when dropped, or `None` if a sync is already running.
    pub fn try_acquire(&self) -> Option<SyncGuard> {
        if self.in_progress.replace(true) {
            return None;
        }
        Some(SyncGuard {
            in_progress: Rc::clone(&self.in_progress),
        })
    }

    pub fn is_held(&self) -> bool {
        self.in_progress.get()
    }
}

/// Scoped ownership of a [`SyncLock`]. Released on drop, including during unwinding.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SyncGuard {
    in_progress: Rc<Cell<bool>>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.in_progress.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn second_acquire_fails_while_guard_is_alive() {
        let lock = SyncLock::new();
        let shared = lock.clone();

        let guard = lock.try_acquire().unwrap();
        assert!(shared.is_held());
        assert!(shared.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_held());
        assert!(shared.try_acquire().is_some());
    }

    #[test]
    fn guard_is_released_when_the_holder_panics() {
        let lock = SyncLock::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.try_acquire().unwrap();
            panic!("propagation step failed");
        }));

        assert!(result.is_err());
        assert!(!lock.is_held());
    }
}
