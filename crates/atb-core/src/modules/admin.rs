use std::sync::Arc;

use crate::{
    event::CallContext,
    handler::{handler_fn, HandleStatus, HandlerFn, HandlerModule},
    ports::PermissionAdmin,
    snapshot::RequestSnapshot,
    state::BotContext,
    Result,
};

use super::{id_arg, OWNER_ONLY_TEXT};

pub const BLACKLIST_USAGE_TEXT: &str = "Usage: /blacklist <id> or /unblacklist <id>";
pub const OWNER_EXEMPT_TEXT: &str = "The owner cannot be blacklisted.";

/// Owner commands editing the blacklist.
pub struct AdminModule {
    permissions: Arc<dyn PermissionAdmin>,
}

impl AdminModule {
    pub fn new(permissions: Arc<dyn PermissionAdmin>) -> Self {
        Self { permissions }
    }

    fn set_blacklisted(
        &self,
        bot: &RequestSnapshot,
        ctx: &CallContext,
        blacklisted: bool,
    ) -> Result<HandleStatus> {
        if !bot.is_from_owner() {
            return bot.error_info(OWNER_ONLY_TEXT);
        }
        let Some(id) = id_arg(&ctx.args) else {
            return bot.error_info(BLACKLIST_USAGE_TEXT);
        };

        if blacklisted {
            if id == bot.shared().owner_id().0 {
                return bot.error_info(OWNER_EXEMPT_TEXT);
            }
            self.permissions.blacklist(id)?;
            bot.reply(&format!("{id} is now blacklisted."))?;
        } else {
            self.permissions.unblacklist(id)?;
            bot.reply(&format!("{id} is no longer blacklisted."))?;
        }
        Ok(HandleStatus::blocked())
    }
}

impl HandlerModule for AdminModule {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn commands(self: Arc<Self>) -> Vec<(String, HandlerFn)> {
        let add = Arc::clone(&self);
        let remove = self;
        vec![
            (
                "blacklist".to_string(),
                handler_fn(move |bot, _event, ctx| add.set_blacklisted(bot, ctx, true)),
            ),
            (
                "unblacklist".to_string(),
                handler_fn(move |bot, _event, ctx| remove.set_blacklisted(bot, ctx, false)),
            ),
        ]
    }
}
