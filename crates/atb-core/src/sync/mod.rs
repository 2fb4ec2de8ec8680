//! Blocking lock primitives whose release is deferred by a fixed delay.
//!
//! Both are used to debounce repeated actions (double clicks on inline buttons):
//! after the guarded section ends the lock stays held for `delay`, so the same
//! action cannot immediately re-enter.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

pub mod delayed;
pub mod keyed;

pub use delayed::{DelayedGuard, DelayedReleaseLock};
pub use keyed::{KeyGuard, KeyHandle, KeyedMutex};

/// Default release delay (seconds granularity matches the Telegram UX).
pub const DEFAULT_RELEASE_DELAY: Duration = Duration::from_secs(10);

/// Lock a std mutex, ignoring poisoning.
///
/// Guarded data here is plain flags and maps that stay consistent even if a
/// holder panicked, so recovering the guard is always sound.
pub(crate) fn lock_unpoisoned<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` on a background thread after `delay`.
pub(crate) fn after_delay(delay: Duration, f: impl FnOnce() + Send + 'static) {
    if delay.is_zero() {
        f();
        return;
    }
    thread::spawn(move || {
        thread::sleep(delay);
        f();
    });
}
