use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use serde_json::Value;
use tracing::debug;

use crate::{
    callback_data::CallbackDataServer,
    domain::{ChatId, Identity, MessageId, MessageRef, UserId},
    errors::Error,
    handler::HandleStatus,
    ports::{MessagingPort, PermissionStore},
    snapshot::RequestSnapshot,
    sync::{lock_unpoisoned, KeyedMutex},
    Result,
};

/// Names under which the three identity fields are addressable as fields.
pub const CHAT_FIELD: &str = "chat_id";
pub const USER_FIELD: &str = "user_id";
pub const MESSAGE_FIELD: &str = "message_id";

pub const QUERY_ERROR_TEXT: &str = "This button is no longer valid, please try again.";

/// Methods that depend on "who triggered me".
///
/// Implemented by both the shared state (latest identity) and by
/// [`RequestSnapshot`] (frozen identity). Provided methods only read identity
/// through `identity()`, so calling them on a snapshot runs them against the
/// snapshot's frozen chat/user/message even while other events advance the
/// shared state. Identity-free helpers are associated functions instead.
pub trait BotContext {
    fn identity(&self) -> Identity;
    fn shared(&self) -> &SharedBotState;

    fn chat_id(&self) -> ChatId {
        self.identity().chat_id
    }

    fn user_id(&self) -> UserId {
        self.identity().user_id
    }

    fn message_id(&self) -> Option<MessageId> {
        self.identity().message_id
    }

    fn is_from_owner(&self) -> bool {
        self.user_id() == self.shared().owner_id()
    }

    /// Send to the current chat without quoting.
    fn send(&self, text: &str) -> Result<MessageRef> {
        self.shared().messenger().send_text(self.chat_id(), text, None)
    }

    /// Reply to the triggering message; returns the id of the sent message.
    fn reply(&self, text: &str) -> Result<MessageId> {
        let id = self.identity();
        let sent = self
            .shared()
            .messenger()
            .send_text(id.chat_id, text, id.message_id)?;
        Ok(sent.message_id)
    }

    /// Reply with an error notice and stop the handler chain.
    fn error_info(&self, text: &str) -> Result<HandleStatus> {
        self.debug_info(&format!("error info: {text}"));
        self.reply(text)?;
        Ok(HandleStatus::denied())
    }

    /// Tell the chat a button press could not be handled.
    fn query_error(&self) -> Result<HandleStatus> {
        self.error_info(QUERY_ERROR_TEXT)
    }

    fn debug_info(&self, msg: &str) {
        let id = self.identity();
        debug!(
            chat = id.chat_id.0,
            user = id.user_id.0,
            message = id.message_id.map(|m| m.0),
            "{msg}"
        );
    }
}

/// The single long-lived bot instance shared by every worker thread.
///
/// `current` tracks the most recently dispatched event (last writer wins);
/// every other field is eventually consistent across threads.
pub struct SharedBotState {
    owner_id: UserId,
    current: RwLock<Identity>,
    fields: RwLock<HashMap<String, Value>>,
    messenger: Arc<dyn MessagingPort>,
    store: Arc<dyn PermissionStore>,
    bot_lock: Mutex<()>,
    button_locks: KeyedMutex,
    callback_data: CallbackDataServer,
}

impl SharedBotState {
    pub fn new(
        owner_id: UserId,
        messenger: Arc<dyn MessagingPort>,
        store: Arc<dyn PermissionStore>,
        button_lock_delay: Duration,
    ) -> Self {
        Self {
            owner_id,
            current: RwLock::new(Identity::default()),
            fields: RwLock::new(HashMap::new()),
            messenger,
            store,
            bot_lock: Mutex::new(()),
            button_locks: KeyedMutex::new(button_lock_delay),
            callback_data: CallbackDataServer::new(),
        }
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn messenger(&self) -> &Arc<dyn MessagingPort> {
        &self.messenger
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    pub fn button_locks(&self) -> &KeyedMutex {
        &self.button_locks
    }

    pub fn callback_data(&self) -> &CallbackDataServer {
        &self.callback_data
    }

    pub fn current(&self) -> Identity {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `identity` as the latest one and hand out a snapshot frozen on it.
    pub fn renew_status(self: &Arc<Self>, identity: Identity) -> RequestSnapshot {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = identity;
        RequestSnapshot::seeded(Arc::clone(self), identity)
    }

    /// Read a named field; identity names read the latest identity.
    pub fn field(&self, name: &str) -> Result<Value> {
        if let Some(v) = identity_value(&self.current(), name) {
            return Ok(v);
        }
        self.fields
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))
    }

    /// Write a named field; identity names move the latest identity.
    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            if set_identity_value(&mut current, name, &value)? {
                return Ok(());
            }
        }
        self.fields
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), value);
        Ok(())
    }

    /// True if any of `ids` is blacklisted.
    ///
    /// Checks are serialized on one process-wide lock; the lock is dropped
    /// before returning on every path.
    pub fn any_blacklisted(&self, ids: &[i64]) -> Result<bool> {
        let _guard = lock_unpoisoned(&self.bot_lock);
        for id in ids {
            if self.store.is_blacklisted(*id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl BotContext for SharedBotState {
    fn identity(&self) -> Identity {
        self.current()
    }

    fn shared(&self) -> &SharedBotState {
        self
    }
}

pub(crate) fn identity_value(id: &Identity, name: &str) -> Option<Value> {
    match name {
        CHAT_FIELD => Some(Value::from(id.chat_id.0)),
        USER_FIELD => Some(Value::from(id.user_id.0)),
        MESSAGE_FIELD => Some(id.message_id.map_or(Value::Null, |m| Value::from(m.0))),
        _ => None,
    }
}

/// Apply a write to one of the identity names; `Ok(false)` for any other name.
pub(crate) fn set_identity_value(id: &mut Identity, name: &str, value: &Value) -> Result<bool> {
    match name {
        CHAT_FIELD => id.chat_id = ChatId(expect_i64(name, value)?),
        USER_FIELD => id.user_id = UserId(expect_i64(name, value)?),
        MESSAGE_FIELD => {
            id.message_id = match value {
                Value::Null => None,
                v => Some(MessageId(
                    i32::try_from(expect_i64(name, v)?)
                        .map_err(|_| Error::InvalidField(name.to_string()))?,
                )),
            };
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn expect_i64(name: &str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| Error::InvalidField(name.to_string()))
}
