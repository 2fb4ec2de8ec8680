//! Hand-written fakes shared by unit tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::{
    domain::{ChatId, Identity, MessageId, MessageRef, UserId},
    errors::Error,
    event::{parse_command, ChatKind, EventKind, IncomingEvent},
    gpt::GptBackend,
    ports::{MessagingPort, PermissionAdmin, PermissionStore},
    state::SharedBotState,
    Result,
};

pub const OWNER: i64 = 1;
pub const BUTTON_DELAY: Duration = Duration::from_millis(300);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub message_id: MessageId,
}

#[derive(Debug)]
pub struct FakeMessenger {
    next_id: AtomicI32,
    sent: Mutex<Vec<Sent>>,
    answered: Mutex<Vec<String>>,
}

impl Default for FakeMessenger {
    fn default() -> Self {
        Self {
            next_id: AtomicI32::new(2),
            sent: Mutex::new(Vec::new()),
            answered: Mutex::new(Vec::new()),
        }
    }
}

impl FakeMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }
}

impl MessagingPort for FakeMessenger {
    fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            reply_to,
            message_id,
        });
        Ok(MessageRef::new(chat_id, message_id))
    }

    fn answer_callback(&self, callback_id: &str, _text: Option<&str>) -> Result<()> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeStore {
    blacklisted: Mutex<HashSet<i64>>,
    allowed: Mutex<HashSet<i64>>,
    unavailable: AtomicBool,
}

impl FakeStore {
    pub fn blacklist_id(&self, id: i64) {
        self.blacklisted.lock().unwrap().insert(id);
    }

    pub fn set_unavailable(&self, v: bool) {
        self.unavailable.store(v, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("fake store offline".to_string()));
        }
        Ok(())
    }
}

impl PermissionStore for FakeStore {
    fn is_blacklisted(&self, id: i64) -> Result<bool> {
        self.check()?;
        Ok(self.blacklisted.lock().unwrap().contains(&id))
    }

    fn is_allowed(&self, id: i64) -> Result<bool> {
        self.check()?;
        Ok(self.allowed.lock().unwrap().contains(&id))
    }
}

impl PermissionAdmin for FakeStore {
    fn blacklist(&self, id: i64) -> Result<()> {
        self.check()?;
        self.blacklist_id(id);
        Ok(())
    }

    fn unblacklist(&self, id: i64) -> Result<()> {
        self.check()?;
        self.blacklisted.lock().unwrap().remove(&id);
        Ok(())
    }

    fn allow(&self, id: i64) -> Result<()> {
        self.check()?;
        self.allowed.lock().unwrap().insert(id);
        Ok(())
    }

    fn revoke(&self, id: i64) -> Result<()> {
        self.check()?;
        self.allowed.lock().unwrap().remove(&id);
        Ok(())
    }

    fn allowed_ids(&self) -> Result<Vec<i64>> {
        self.check()?;
        Ok(self.allowed.lock().unwrap().iter().copied().collect())
    }
}

/// Answers `#<sid>: <content>`; session ids count up from 1.
#[derive(Debug, Default)]
pub struct FakeBackend {
    last_id: AtomicI64,
    created: Mutex<Vec<i64>>,
    down: AtomicBool,
}

impl FakeBackend {
    pub fn created(&self) -> Vec<i64> {
        self.created.lock().unwrap().clone()
    }

    pub fn set_down(&self, v: bool) {
        self.down.store(v, Ordering::SeqCst);
    }
}

impl GptBackend for FakeBackend {
    fn new_session_id(&self) -> Result<i64> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::External("gpt proxy down".to_string()));
        }
        Ok(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn create(&self, sid: i64) -> Result<()> {
        self.created.lock().unwrap().push(sid);
        Ok(())
    }

    fn ask(&self, sid: i64, content: &str) -> Result<String> {
        Ok(format!("#{sid}: {content}"))
    }
}

pub fn identity(chat: i64, user: i64, msg: Option<i32>) -> Identity {
    Identity {
        chat_id: ChatId(chat),
        user_id: UserId(user),
        message_id: msg.map(MessageId),
    }
}

pub fn shared_state() -> (Arc<SharedBotState>, Arc<FakeMessenger>) {
    shared_state_with(FakeStore::default())
}

pub fn shared_state_with(store: FakeStore) -> (Arc<SharedBotState>, Arc<FakeMessenger>) {
    shared_state_with_store(Arc::new(store))
}

pub fn shared_state_with_store(
    store: Arc<FakeStore>,
) -> (Arc<SharedBotState>, Arc<FakeMessenger>) {
    let messenger = Arc::new(FakeMessenger::default());
    let state = Arc::new(SharedBotState::new(
        UserId(OWNER),
        messenger.clone(),
        store,
        BUTTON_DELAY,
    ));
    (state, messenger)
}

fn event(chat: i64, user: i64, msg: i32, kind: EventKind) -> IncomingEvent {
    IncomingEvent {
        chat_id: ChatId(chat),
        chat_kind: if chat > 0 {
            ChatKind::Private
        } else {
            ChatKind::Group
        },
        user_id: Some(UserId(user)),
        message_id: Some(MessageId(msg)),
        kind,
    }
}

pub fn text_event(chat: i64, user: i64, msg: i32, text: &str) -> IncomingEvent {
    event(
        chat,
        user,
        msg,
        EventKind::Text {
            text: text.to_string(),
            reply_to: None,
        },
    )
}

pub fn reply_event(chat: i64, user: i64, msg: i32, reply_to: i32, text: &str) -> IncomingEvent {
    event(
        chat,
        user,
        msg,
        EventKind::Text {
            text: text.to_string(),
            reply_to: Some(MessageId(reply_to)),
        },
    )
}

pub fn command_event(chat: i64, user: i64, msg: i32, text: &str) -> IncomingEvent {
    let (name, args) = parse_command(text).unwrap();
    event(
        chat,
        user,
        msg,
        EventKind::Command {
            name,
            args,
            text: text.to_string(),
        },
    )
}

pub fn button_event(chat: i64, user: i64, msg: i32, data: &str) -> IncomingEvent {
    event(
        chat,
        user,
        msg,
        EventKind::Button {
            callback_id: format!("cb-{msg}"),
            data: data.to_string(),
        },
    )
}
