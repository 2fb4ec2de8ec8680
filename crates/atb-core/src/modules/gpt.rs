use std::sync::Arc;

use crate::{
    domain::{ChatId, EntityKey},
    errors::Error,
    event::{CallContext, IncomingEvent},
    gpt::SessionKeeper,
    handler::{handler_fn, HandleStatus, HandlerFn, HandlerModule},
    ports::PermissionAdmin,
    snapshot::RequestSnapshot,
    state::{BotContext, SharedBotState},
    Result,
};

use super::{id_arg, OWNER_ONLY_TEXT};

pub const NO_PERMISSION_TEXT: &str = "You or this chat are not allowed to use GPT.";
pub const ALLOW_USAGE_TEXT: &str = "Usage: /allowgpt <chat id>";
pub const EMPTY_QUESTION_TEXT: &str = "Usage: /gpt <question>";
pub const ENABLED_TEXT: &str = "Enabled.";

/// `/gpt` conversations threaded through replies.
pub struct GptModule {
    keeper: Arc<SessionKeeper>,
    permissions: Arc<dyn PermissionAdmin>,
}

impl GptModule {
    pub fn new(keeper: Arc<SessionKeeper>, permissions: Arc<dyn PermissionAdmin>) -> Self {
        Self {
            keeper,
            permissions,
        }
    }

    fn permitted(&self, bot: &RequestSnapshot) -> Result<bool> {
        Ok(bot.is_from_owner() || self.permissions.is_allowed(bot.chat_id().0)?)
    }

    /// Reply with `answer` and thread the reply into the session of `asked`.
    fn answer(&self, bot: &RequestSnapshot, asked: EntityKey, answer: &str) -> Result<()> {
        let reply_id = bot.reply(answer)?;
        self.keeper
            .register_session(asked, EntityKey::new(bot.chat_id(), reply_id))
    }

    fn gpt(&self, bot: &RequestSnapshot, event: &IncomingEvent) -> Result<HandleStatus> {
        if !self.permitted(bot)? {
            return bot.error_info(NO_PERMISSION_TEXT);
        }
        let Some(asked) = bot.identity().entity() else {
            return Ok(HandleStatus::Passed);
        };
        let question = SessionKeeper::process_message(event.text().unwrap_or_default());
        if question.is_empty() {
            return bot.error_info(EMPTY_QUESTION_TEXT);
        }

        let answer = self.keeper.call(asked, &question)?;
        self.answer(bot, asked, &answer)?;
        Ok(HandleStatus::blocked())
    }

    fn allow_gpt(
        &self,
        bot: &RequestSnapshot,
        event: &IncomingEvent,
        ctx: &CallContext,
    ) -> Result<HandleStatus> {
        if !bot.is_from_owner() {
            return bot.error_info(OWNER_ONLY_TEXT);
        }
        let chat = if event.is_private() {
            match id_arg(&ctx.args) {
                Some(id) => id,
                None => return bot.error_info(ALLOW_USAGE_TEXT),
            }
        } else {
            bot.chat_id().0
        };

        self.permissions.allow(chat)?;
        bot.debug_info(&format!("gpt allowed for {chat}"));
        bot.reply(ENABLED_TEXT)?;
        Ok(HandleStatus::blocked())
    }
}

impl HandlerModule for GptModule {
    fn name(&self) -> &'static str {
        "gpt"
    }

    /// A reply to any message of a known session continues it.
    fn on_text(&self, bot: &RequestSnapshot, event: &IncomingEvent) -> Result<HandleStatus> {
        if !self.permitted(bot)? {
            return Ok(HandleStatus::Passed);
        }
        let Some(reply_to) = event.reply_to() else {
            return Ok(HandleStatus::Passed);
        };
        let asked = EntityKey::new(bot.chat_id(), reply_to);

        let answer = match self
            .keeper
            .ensure_id_call(asked, event.text().unwrap_or_default())
        {
            Ok(answer) => answer,
            Err(Error::SessionNotFound(_)) => {
                bot.debug_info("no session, ignored");
                return Ok(HandleStatus::Passed);
            }
            Err(e) => return Err(e),
        };
        self.answer(bot, asked, &answer)?;
        Ok(HandleStatus::blocked())
    }

    fn on_chat_migrate(&self, old: ChatId, new: ChatId, bot: &SharedBotState) -> Result<()> {
        if self.permissions.migrate_allowed(old.0, new.0)? {
            bot.debug_info(&format!("gpt allowed chat migrate {} -> {}", old.0, new.0));
        }
        Ok(())
    }

    fn commands(self: Arc<Self>) -> Vec<(String, HandlerFn)> {
        let ask = Arc::clone(&self);
        let allow = self;
        vec![
            (
                "gpt".to_string(),
                handler_fn(move |bot, event, _ctx| ask.gpt(bot, event)),
            ),
            (
                "allowgpt".to_string(),
                handler_fn(move |bot, event, ctx| allow.allow_gpt(bot, event, ctx)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatcher::Dispatcher,
        domain::MessageId,
        ports::PermissionStore,
        testing::{
            command_event, reply_event, shared_state_with_store, FakeBackend, FakeMessenger,
            FakeStore, OWNER,
        },
    };

    struct Fixture {
        dispatcher: Dispatcher,
        messenger: Arc<FakeMessenger>,
        store: Arc<FakeStore>,
        keeper: Arc<SessionKeeper>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(FakeStore::default());
        let (state, messenger) = shared_state_with_store(Arc::clone(&store));
        let keeper = Arc::new(SessionKeeper::new(Arc::new(FakeBackend::default())));
        let module: Arc<dyn HandlerModule> =
            Arc::new(GptModule::new(Arc::clone(&keeper), store.clone()));
        Fixture {
            dispatcher: Dispatcher::new(state, vec![module]),
            messenger,
            store,
            keeper,
        }
    }

    #[test]
    fn gpt_requires_permission() {
        let f = fixture();
        let status = f
            .dispatcher
            .dispatch(command_event(-5, 9, 1, "/gpt hello"))
            .unwrap();
        assert_eq!(status, HandleStatus::denied());
        assert_eq!(f.messenger.sent()[0].text, NO_PERMISSION_TEXT);
    }

    #[test]
    fn allowed_chat_gets_threaded_answers() {
        let f = fixture();
        f.dispatcher
            .dispatch(command_event(-5, OWNER, 1, "/allowgpt"))
            .unwrap();
        assert!(f.store.is_allowed(-5).unwrap());

        f.dispatcher
            .dispatch(command_event(-5, 9, 10, "/gpt hello"))
            .unwrap();
        let answer = f.messenger.sent().pop().unwrap();
        assert_eq!(answer.text, "#1: hello");
        assert_eq!(answer.reply_to, Some(MessageId(10)));

        let next = EntityKey::new(ChatId(-5), answer.message_id);
        assert_eq!(f.keeper.session_id(next), Some(1));

        let status = f
            .dispatcher
            .dispatch(reply_event(-5, 9, 20, answer.message_id.0, "and then?"))
            .unwrap();
        assert_eq!(status, HandleStatus::blocked());
        assert_eq!(f.messenger.sent().pop().unwrap().text, "#1: and then?");
    }

    #[test]
    fn reply_without_session_passes() {
        let f = fixture();
        f.store.allow(-5).unwrap();
        let status = f
            .dispatcher
            .dispatch(reply_event(-5, 9, 3, 2, "hi"))
            .unwrap();
        assert_eq!(status, HandleStatus::Passed);
        assert!(f.messenger.sent().is_empty());
    }

    #[test]
    fn allowgpt_is_owner_only_and_needs_an_id_in_private() {
        let f = fixture();
        let status = f
            .dispatcher
            .dispatch(command_event(-5, 9, 1, "/allowgpt"))
            .unwrap();
        assert_eq!(status, HandleStatus::denied());
        assert!(!f.store.is_allowed(-5).unwrap());

        f.dispatcher
            .dispatch(command_event(OWNER, OWNER, 2, "/allowgpt nope"))
            .unwrap();
        assert_eq!(f.messenger.sent().pop().unwrap().text, ALLOW_USAGE_TEXT);

        f.dispatcher
            .dispatch(command_event(OWNER, OWNER, 3, "/allowgpt -77"))
            .unwrap();
        assert!(f.store.is_allowed(-77).unwrap());
    }

    #[test]
    fn migration_moves_the_allow_entry() {
        let f = fixture();
        f.store.allow(-5).unwrap();
        f.dispatcher.chat_migrate(ChatId(-5), ChatId(-1005)).unwrap();
        assert!(!f.store.is_allowed(-5).unwrap());
        assert!(f.store.is_allowed(-1005).unwrap());
    }
}
