//! End-to-end flow through the public API: SQLite store, dispatcher, GPT module.

use std::{
    sync::{
        atomic::{AtomicI32, AtomicI64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use atb_core::{
    dispatcher::Dispatcher,
    domain::{ChatId, EntityKey, MessageId, MessageRef, UserId},
    event::{parse_command, ChatKind, EventKind, IncomingEvent},
    gpt::{GptBackend, SessionKeeper},
    handler::{HandleStatus, HandlerModule},
    modules::{AdminModule, GptModule},
    ports::{MessagingPort, PermissionAdmin},
    state::SharedBotState,
    store::SqlitePermissionStore,
    Result,
};

const OWNER: i64 = 1;

#[derive(Default)]
struct Messenger {
    next_id: AtomicI32,
    sent: Mutex<Vec<(ChatId, String, Option<MessageId>, MessageId)>>,
}

impl MessagingPort for Messenger {
    fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        // Message 1 is the user's; bot replies start at 2.
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 2);
        self.sent
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), reply_to, id));
        Ok(MessageRef::new(chat_id, id))
    }

    fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct EchoBackend {
    last: AtomicI64,
}

impl GptBackend for EchoBackend {
    fn new_session_id(&self) -> Result<i64> {
        Ok(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn create(&self, _sid: i64) -> Result<()> {
        Ok(())
    }

    fn ask(&self, sid: i64, content: &str) -> Result<String> {
        Ok(format!("[{sid}] {content}"))
    }
}

fn message(chat: i64, user: i64, msg: i32, kind: EventKind) -> IncomingEvent {
    IncomingEvent {
        chat_id: ChatId(chat),
        chat_kind: ChatKind::Group,
        user_id: Some(UserId(user)),
        message_id: Some(MessageId(msg)),
        kind,
    }
}

fn command(chat: i64, user: i64, msg: i32, text: &str) -> IncomingEvent {
    let (name, args) = parse_command(text).unwrap();
    message(
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

struct Bot {
    dispatcher: Arc<Dispatcher>,
    messenger: Arc<Messenger>,
    keeper: Arc<SessionKeeper>,
    store: Arc<SqlitePermissionStore>,
    _dir: tempfile::TempDir,
}

fn bot() -> Bot {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SqlitePermissionStore::open(dir.path().join("blacklist.db"), dir.path().join("gpt.db"))
            .unwrap(),
    );
    let messenger = Arc::new(Messenger::default());
    let state = Arc::new(SharedBotState::new(
        UserId(OWNER),
        messenger.clone(),
        store.clone(),
        Duration::from_millis(200),
    ));
    let keeper = Arc::new(SessionKeeper::new(Arc::new(EchoBackend::default())));
    let modules: Vec<Arc<dyn HandlerModule>> = vec![
        Arc::new(AdminModule::new(store.clone())),
        Arc::new(GptModule::new(Arc::clone(&keeper), store.clone())),
    ];
    Bot {
        dispatcher: Arc::new(Dispatcher::new(state, modules)),
        messenger,
        keeper,
        store,
        _dir: dir,
    }
}

#[test]
fn gpt_conversation_threads_through_replies() {
    let bot = bot();
    bot.store.allow(100).unwrap();

    let status = bot
        .dispatcher
        .dispatch(command(100, 7, 1, "/gpt hello"))
        .unwrap();
    assert_eq!(status, HandleStatus::blocked());

    let sent = bot.messenger.sent.lock().unwrap().clone();
    assert_eq!(
        sent[0],
        (ChatId(100), "[1] hello".to_string(), Some(MessageId(1)), MessageId(2))
    );

    let first = EntityKey::new(ChatId(100), MessageId(1));
    let reply = EntityKey::new(ChatId(100), MessageId(2));
    assert_eq!(bot.keeper.session_id(first), Some(1));
    assert_eq!(bot.keeper.session_id(reply), Some(1));

    let status = bot
        .dispatcher
        .dispatch(message(
            100,
            7,
            5,
            EventKind::Text {
                text: "tell me more".to_string(),
                reply_to: Some(MessageId(2)),
            },
        ))
        .unwrap();
    assert_eq!(status, HandleStatus::blocked());
    let last = bot.messenger.sent.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.1, "[1] tell me more");
    assert_eq!(last.2, Some(MessageId(5)));
}

#[test]
fn blacklisted_user_is_denied_across_threads() {
    let bot = bot();
    bot.store.allow(100).unwrap();
    bot.dispatcher
        .dispatch(command(OWNER, OWNER, 1, "/blacklist 66"))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dispatcher = Arc::clone(&bot.dispatcher);
            thread::spawn(move || {
                let user = if i % 2 == 0 { 66 } else { 7 };
                let status = dispatcher.handle(command(100, user, 10 + i, "/gpt hi"));
                (user, status)
            })
        })
        .collect();

    for h in handles {
        let (user, status) = h.join().unwrap();
        if user == 66 {
            assert_eq!(status, HandleStatus::denied());
        } else {
            assert_eq!(status, HandleStatus::blocked());
        }
    }
    let session = |msg| bot.keeper.session_id(EntityKey::new(ChatId(100), MessageId(msg)));
    assert_eq!(session(10), None);
    assert!(session(11).is_some());
}
