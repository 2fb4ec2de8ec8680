use crate::domain::{ChatId, Identity, MessageId, UserId};

/// Transport-agnostic inbound event.
///
/// Telegram-specific fields stay in the Telegram adapter; the core only needs
/// the identity triple and the event kind.
#[derive(Clone, Debug)]
pub struct IncomingEvent {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub user_id: Option<UserId>,
    /// For button presses this is the message carrying the keyboard.
    pub message_id: Option<MessageId>,
    pub kind: EventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

#[derive(Clone, Debug)]
pub enum EventKind {
    Text {
        text: String,
        reply_to: Option<MessageId>,
    },
    Command {
        name: String,
        args: Vec<String>,
        text: String,
    },
    Button {
        callback_id: String,
        data: String,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    ChannelPost {
        text: Option<String>,
    },
    EditedChannelPost {
        text: Option<String>,
    },
    ChatMigrate {
        from: ChatId,
    },
}

impl IncomingEvent {
    pub fn identity(&self) -> Identity {
        Identity {
            chat_id: self.chat_id,
            user_id: self.user_id.unwrap_or_default(),
            message_id: self.message_id,
        }
    }

    pub fn is_private(&self) -> bool {
        self.chat_kind == ChatKind::Private
    }

    /// Message text for text-like events (commands included).
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text { text, .. } | EventKind::Command { text, .. } => Some(text),
            EventKind::ChannelPost { text } | EventKind::EditedChannelPost { text } => {
                text.as_deref()
            }
            EventKind::Photo { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }

    pub fn reply_to(&self) -> Option<MessageId> {
        match &self.kind {
            EventKind::Text { reply_to, .. } => *reply_to,
            _ => None,
        }
    }
}

/// Per-call context handed to command handlers alongside the event.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    pub args: Vec<String>,
}

impl CallContext {
    pub fn for_event(event: &IncomingEvent) -> Self {
        match &event.kind {
            EventKind::Command { args, .. } => Self { args: args.clone() },
            _ => Self::default(),
        }
    }
}

/// Split `/name@bot arg1 arg2` into (`name`, args). Returns `None` for non-commands.
pub fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let mut words = rest.split_whitespace();
    let head = words.next()?;
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((
        name.to_lowercase(),
        words.map(|s| s.to_string()).collect(),
    ))
}
