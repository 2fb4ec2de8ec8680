//! Per-event facade over the shared bot state.
//!
//! Worker threads share one `SharedBotState` whose "current" chat/user/message
//! moves on as soon as the next event is dispatched. A `RequestSnapshot` freezes
//! those three values for the lifetime of one handler call; everything else is
//! read from and written to the shared state.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::{
    domain::Identity,
    state::{identity_value, set_identity_value, BotContext, SharedBotState},
    sync::lock_unpoisoned,
    Result,
};

pub struct RequestSnapshot {
    shared: Arc<SharedBotState>,
    identity: Mutex<Identity>,
}

impl RequestSnapshot {
    /// Freeze whatever identity the shared state currently holds.
    pub fn new(shared: Arc<SharedBotState>) -> Self {
        let identity = shared.current();
        Self::seeded(shared, identity)
    }

    pub fn seeded(shared: Arc<SharedBotState>, identity: Identity) -> Self {
        Self {
            shared,
            identity: Mutex::new(identity),
        }
    }

    pub fn field(&self, name: &str) -> Result<Value> {
        match identity_value(&self.identity(), name) {
            Some(v) => Ok(v),
            None => self.shared.field(name),
        }
    }

    /// Identity names stay local to this snapshot; anything else writes through.
    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        if set_identity_value(&mut lock_unpoisoned(&self.identity), name, &value)? {
            return Ok(());
        }
        self.shared.set_field(name, value)
    }
}

impl BotContext for RequestSnapshot {
    fn identity(&self) -> Identity {
        *lock_unpoisoned(&self.identity)
    }

    fn shared(&self) -> &SharedBotState {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use serde_json::json;

    use super::*;
    use crate::{
        domain::{ChatId, MessageId, UserId},
        errors::Error,
        state::{CHAT_FIELD, MESSAGE_FIELD, USER_FIELD},
        testing::{identity, shared_state},
    };

    #[test]
    fn identity_is_frozen_against_shared_updates() {
        let (shared, _) = shared_state();
        let snap = shared.renew_status(identity(100, 7, Some(1)));

        shared.renew_status(identity(200, 8, Some(5)));
        assert_eq!(shared.chat_id(), ChatId(200));
        assert_eq!(snap.chat_id(), ChatId(100));
        assert_eq!(snap.user_id(), UserId(7));
        assert_eq!(snap.message_id(), Some(MessageId(1)));
    }

    #[test]
    fn new_snapshot_captures_current_identity() {
        let (shared, _) = shared_state();
        shared.renew_status(identity(3, 4, None));
        let snap = RequestSnapshot::new(Arc::clone(&shared));
        assert_eq!(snap.identity(), identity(3, 4, None));
        assert_eq!(snap.field(MESSAGE_FIELD).unwrap(), Value::Null);
    }

    #[test]
    fn plain_fields_write_through() {
        let (shared, _) = shared_state();
        let first = shared.renew_status(identity(1, 1, Some(1)));
        first.set_field("counter", json!(3)).unwrap();

        assert_eq!(shared.field("counter").unwrap(), json!(3));
        let later = shared.renew_status(identity(2, 2, Some(2)));
        assert_eq!(later.field("counter").unwrap(), json!(3));
    }

    #[test]
    fn identity_writes_stay_local() {
        let (shared, _) = shared_state();
        let snap = shared.renew_status(identity(1, 1, Some(1)));
        snap.set_field(CHAT_FIELD, json!(555)).unwrap();
        snap.set_field(MESSAGE_FIELD, Value::Null).unwrap();

        assert_eq!(snap.field(CHAT_FIELD).unwrap(), json!(555));
        assert_eq!(snap.message_id(), None);
        assert_eq!(shared.chat_id(), ChatId(1));
        assert_eq!(shared.message_id(), Some(MessageId(1)));
        assert!(matches!(
            snap.set_field(USER_FIELD, json!("nope")),
            Err(Error::InvalidField(_))
        ));
    }

    #[test]
    fn missing_field_is_the_same_error_on_both() {
        let (shared, _) = shared_state();
        let snap = shared.renew_status(identity(1, 1, None));
        assert!(matches!(snap.field("nope"), Err(Error::KeyNotFound(n)) if n == "nope"));
        assert!(matches!(shared.field("nope"), Err(Error::KeyNotFound(n)) if n == "nope"));
    }

    #[test]
    fn bound_methods_run_with_the_snapshot_identity() {
        let (shared, messenger) = shared_state();
        let snap = shared.renew_status(identity(100, 7, Some(1)));
        shared.renew_status(identity(200, 8, Some(9)));

        snap.reply("to 100").unwrap();
        shared.reply("to 200").unwrap();

        let sent = messenger.sent();
        assert_eq!(sent[0].chat_id, ChatId(100));
        assert_eq!(sent[0].reply_to, Some(MessageId(1)));
        assert_eq!(sent[1].chat_id, ChatId(200));
        assert_eq!(sent[1].reply_to, Some(MessageId(9)));
    }

    #[test]
    fn concurrent_events_keep_their_own_identity() {
        let (shared, _) = shared_state();
        let workers: Vec<_> = (0..16i64)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let mine = identity(1000 + i, 50 + i, Some(i as i32));
                    let snap = shared.renew_status(mine);
                    for _ in 0..50 {
                        assert_eq!(snap.identity(), mine);
                        assert_eq!(snap.field(CHAT_FIELD).unwrap(), json!(1000 + i));
                        thread::sleep(Duration::from_micros(100));
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
    }
}
