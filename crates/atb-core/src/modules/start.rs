use std::sync::Arc;

use crate::{
    handler::{handler_fn, HandlerFn, HandlerModule},
    state::BotContext,
};

pub const GREETING_TEXT: &str = "Hi! Use /gpt <question> to start a conversation.";

/// Answers the configured start command.
pub struct StartModule {
    command: String,
}

impl StartModule {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into().trim_start_matches('/').to_lowercase(),
        }
    }
}

impl HandlerModule for StartModule {
    fn name(&self) -> &'static str {
        "start"
    }

    fn commands(self: Arc<Self>) -> Vec<(String, HandlerFn)> {
        vec![(
            self.command.clone(),
            handler_fn(|bot, _event, _ctx| {
                bot.reply(GREETING_TEXT)?;
                Ok(true)
            }),
        )]
    }
}
