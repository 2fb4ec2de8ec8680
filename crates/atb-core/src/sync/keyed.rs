use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use tracing::debug;

use super::{after_delay, lock_unpoisoned, DEFAULT_RELEASE_DELAY};
use crate::domain::EntityKey;

#[derive(Debug, Default)]
struct SlotState {
    held: bool,
    waiters: usize,
}

/// Per-key lock state; waiters park on `freed` instead of polling.
#[derive(Debug, Default)]
struct Slot {
    state: Mutex<SlotState>,
    freed: Condvar,
}

/// Mutex sharded by entity key, with delayed release.
///
/// A key is present in `memory` while it is held, while its release is
/// pending, or while threads are parked waiting for it. The map mutex only
/// guards map mutation; the per-key critical section is tracked by the slot.
/// Distinct keys never block one another. Waiters are not served in FIFO order.
#[derive(Clone, Debug)]
pub struct KeyedMutex {
    memory: Arc<Mutex<HashMap<EntityKey, Arc<Slot>>>>,
    delay: Duration,
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new(DEFAULT_RELEASE_DELAY)
    }
}

impl KeyedMutex {
    pub fn new(delay: Duration) -> Self {
        Self {
            memory: Arc::new(Mutex::new(HashMap::new())),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn lock_for(&self, key: EntityKey) -> KeyHandle<'_> {
        KeyHandle { owner: self, key }
    }

    pub fn locked(&self, key: &EntityKey) -> bool {
        lock_unpoisoned(&self.memory).contains_key(key)
    }

    /// Number of keys currently present (held, pending release, or contended).
    pub fn active_keys(&self) -> usize {
        lock_unpoisoned(&self.memory).len()
    }

    fn enter(&self, key: EntityKey) -> KeyGuard {
        let slot = {
            let mut memory = lock_unpoisoned(&self.memory);
            let slot = Arc::clone(memory.entry(key).or_default());
            // Registered under the map lock so release never drops a slot
            // that someone is about to wait on.
            lock_unpoisoned(&slot.state).waiters += 1;
            slot
        };

        let mut st = lock_unpoisoned(&slot.state);
        while st.held {
            st = slot.freed.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        st.waiters -= 1;
        st.held = true;
        drop(st);

        debug!("keyed lock acquired: {key}");
        self.guard(key, slot)
    }

    fn try_enter(&self, key: EntityKey) -> Option<KeyGuard> {
        let mut memory = lock_unpoisoned(&self.memory);
        if memory.contains_key(&key) {
            return None;
        }
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState {
                held: true,
                waiters: 0,
            }),
            freed: Condvar::new(),
        });
        memory.insert(key, Arc::clone(&slot));
        drop(memory);

        debug!("keyed lock acquired: {key}");
        Some(self.guard(key, slot))
    }

    fn guard(&self, key: EntityKey, slot: Arc<Slot>) -> KeyGuard {
        KeyGuard {
            memory: Arc::clone(&self.memory),
            key,
            slot: Some(slot),
            delay: self.delay,
        }
    }
}

/// A key bound to its `KeyedMutex`.
pub struct KeyHandle<'a> {
    owner: &'a KeyedMutex,
    key: EntityKey,
}

impl KeyHandle<'_> {
    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// Block until no other thread holds this key, then hold it.
    pub fn enter(&self) -> KeyGuard {
        self.owner.enter(self.key)
    }

    /// Hold the key only if nobody holds it (and no release is pending).
    pub fn try_enter(&self) -> Option<KeyGuard> {
        self.owner.try_enter(self.key)
    }

    pub fn locked(&self) -> bool {
        self.owner.locked(&self.key)
    }
}

/// Held key; dropping it schedules release after the mutex's delay.
#[must_use = "dropping the guard starts the delayed release"]
pub struct KeyGuard {
    memory: Arc<Mutex<HashMap<EntityKey, Arc<Slot>>>>,
    key: EntityKey,
    slot: Option<Arc<Slot>>,
    delay: Duration,
}

impl KeyGuard {
    pub fn key(&self) -> EntityKey {
        self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        let memory = Arc::clone(&self.memory);
        let key = self.key;

        after_delay(self.delay, move || {
            let mut memory = lock_unpoisoned(&memory);
            let mut st = lock_unpoisoned(&slot.state);
            st.held = false;
            if st.waiters > 0 {
                slot.freed.notify_one();
                return;
            }
            drop(st);
            if memory
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &slot))
            {
                memory.remove(&key);
            }
            debug!("keyed lock released: {key}");
        });
    }
}
