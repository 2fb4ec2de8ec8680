use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use super::{after_delay, lock_unpoisoned, DEFAULT_RELEASE_DELAY};

#[derive(Debug, Default)]
struct Inner {
    held: Mutex<bool>,
    freed: Condvar,
}

/// Binary lock whose release happens `delay` after the caller releases it.
///
/// `locked()` keeps reporting `true` until the deferred unmark runs. There is
/// no try-acquire and no timeout: `acquire()` always eventually succeeds.
#[derive(Clone, Debug)]
pub struct DelayedReleaseLock {
    inner: Arc<Inner>,
    delay: Duration,
}

impl Default for DelayedReleaseLock {
    fn default() -> Self {
        Self::new(DEFAULT_RELEASE_DELAY)
    }
}

impl DelayedReleaseLock {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Block until the lock is free, then mark it held.
    pub fn acquire(&self) {
        let mut held = lock_unpoisoned(&self.inner.held);
        while *held {
            held = self
                .inner
                .freed
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    /// Schedule the unmark after the configured delay; returns immediately.
    pub fn release(&self) {
        let inner = Arc::clone(&self.inner);
        after_delay(self.delay, move || {
            *lock_unpoisoned(&inner.held) = false;
            inner.freed.notify_one();
        });
    }

    pub fn locked(&self) -> bool {
        *lock_unpoisoned(&self.inner.held)
    }

    /// Scoped acquisition; dropping the guard schedules the delayed release.
    pub fn lock(&self) -> DelayedGuard<'_> {
        self.acquire();
        DelayedGuard { lock: self }
    }
}

#[must_use = "dropping the guard starts the delayed release"]
pub struct DelayedGuard<'a> {
    lock: &'a DelayedReleaseLock,
}

impl Drop for DelayedGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
