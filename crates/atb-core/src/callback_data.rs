//! One-shot storage for inline button payloads.
//!
//! Telegram caps callback data at 64 bytes, so buttons carry a short key and
//! the full payload waits here until the button is pressed.

use std::{collections::HashMap, sync::Mutex};

use crate::{errors::Error, sync::lock_unpoisoned, Result};

#[derive(Debug, Default)]
pub struct CallbackDataServer {
    memory: Mutex<HashMap<String, String>>,
}

impl CallbackDataServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`; an existing key is never overwritten.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let mut memory = lock_unpoisoned(&self.memory);
        if memory.contains_key(&key) {
            return Err(Error::DuplicateKey(key));
        }
        memory.insert(key, value.into());
        Ok(())
    }

    /// Remove and return the payload for `key`.
    pub fn take(&self, key: &str) -> Result<String> {
        lock_unpoisoned(&self.memory)
            .remove(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.memory).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
