//! Telegram update -> core event conversion.

use teloxide::types::{CallbackQuery, Chat, Message, User};

use atb_core::{
    domain::{ChatId, MessageId, UserId},
    event::{parse_command, ChatKind, EventKind, IncomingEvent},
};

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

fn user_id(user: &User) -> UserId {
    UserId(user.id.0 as i64)
}

fn event_for(msg: &Message, kind: EventKind) -> IncomingEvent {
    IncomingEvent {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: chat_kind(&msg.chat),
        user_id: msg.from().map(user_id),
        message_id: Some(MessageId(msg.id.0)),
        kind,
    }
}

/// Classify a text body as a command or plain text.
pub fn text_kind(text: &str, reply_to: Option<MessageId>) -> EventKind {
    match parse_command(text) {
        Some((name, args)) => EventKind::Command {
            name,
            args,
            text: text.to_string(),
        },
        None => EventKind::Text {
            text: text.to_string(),
            reply_to,
        },
    }
}

/// A regular (non-channel) message. `None` for kinds the bot ignores.
pub fn message_event(msg: &Message) -> Option<IncomingEvent> {
    if let Some(from) = msg.migrate_from_chat_id() {
        return Some(event_for(msg, EventKind::ChatMigrate { from: ChatId(from.0) }));
    }
    if let Some(text) = msg.text() {
        let reply_to = msg.reply_to_message().map(|m| MessageId(m.id.0));
        return Some(event_for(msg, text_kind(text, reply_to)));
    }
    if let Some(photos) = msg.photo() {
        let file_id = photos.last().map(|p| p.file.id.clone())?;
        return Some(event_for(
            msg,
            EventKind::Photo {
                file_id,
                caption: msg.caption().map(str::to_string),
            },
        ));
    }
    None
}

pub fn channel_event(msg: &Message, edited: bool) -> IncomingEvent {
    let text = msg.text().or_else(|| msg.caption()).map(str::to_string);
    let kind = if edited {
        EventKind::EditedChannelPost { text }
    } else {
        EventKind::ChannelPost { text }
    };
    event_for(msg, kind)
}

/// A button press; identity is the chat and message carrying the keyboard.
pub fn callback_event(q: &CallbackQuery) -> Option<IncomingEvent> {
    let msg = q.message.as_ref()?;
    Some(IncomingEvent {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: chat_kind(&msg.chat),
        user_id: Some(user_id(&q.from)),
        message_id: Some(MessageId(msg.id.0)),
        kind: EventKind::Button {
            callback_id: q.id.clone(),
            data: q.data.clone().unwrap_or_default(),
        },
    })
}
