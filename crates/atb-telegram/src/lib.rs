//! Telegram adapter (teloxide).
//!
//! Implements the core `MessagingPort` over the Telegram Bot API and feeds
//! Telegram updates into the core dispatcher on blocking worker threads.

use teloxide::prelude::*;
use tokio::{runtime::Handle, time::sleep};

pub mod convert;
pub mod router;

use atb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    ports::MessagingPort,
    Result,
};

/// Synchronous messenger for handler threads.
///
/// Each call blocks the calling thread on the async client; it must not be
/// used from inside the runtime's own worker threads.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    rt: Handle,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, rt: Handle) -> Self {
        Self { bot, rt }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

impl MessagingPort for TelegramMessenger {
    fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let msg = self.rt.block_on(self.with_retry(|| {
            let req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
            match reply_to {
                Some(id) => req
                    .reply_to_message_id(Self::tg_msg_id(id))
                    .allow_sending_without_reply(true),
                None => req,
            }
        }))?;

        Ok(MessageRef::new(chat_id, MessageId(msg.id.0)))
    }

    fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.rt.block_on(self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        }))?;
        Ok(())
    }
}
