use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A (conversation, message) pair.
///
/// Used as the key for button debouncing and for GPT session association.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl EntityKey {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.chat_id.0, self.message_id.0)
    }
}

/// A message the bot sent; same shape as an entity key.
pub type MessageRef = EntityKey;

/// Who triggered an event: chat, user and (if any) message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub message_id: Option<MessageId>,
}

impl Identity {
    /// Entity key of the triggering message, if the event carried one.
    pub fn entity(&self) -> Option<EntityKey> {
        self.message_id.map(|m| EntityKey::new(self.chat_id, m))
    }
}
