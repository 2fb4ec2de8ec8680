use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::CallbackQuery};
use tracing::{debug, error, info};

use atb_core::{dispatcher::Dispatcher as CoreDispatcher, event::IncomingEvent};

use crate::convert;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CoreDispatcher>,
}

impl AppState {
    /// Hand the event to a blocking worker thread and return immediately.
    fn spawn(&self, event: IncomingEvent) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let chat = event.chat_id.0;
        let worker = tokio::task::spawn_blocking(move || dispatcher.handle(event));
        tokio::spawn(async move {
            match worker.await {
                Ok(status) => debug!(chat, ?status, "event handled"),
                Err(e) => error!(chat, "handler thread failed: {e}"),
            }
        });
    }
}

/// Poll Telegram until ctrl-c.
pub async fn run_polling(bot: Bot, dispatcher: Arc<CoreDispatcher>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!("atb started: @{}", me.username()),
        Err(e) => return Err(anyhow::anyhow!("telegram getMe failed: {e}")),
    }
    info!(commands = ?dispatcher.command_names(), "commands registered");

    let state = Arc::new(AppState { dispatcher });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_channel_post().endpoint(handle_channel_post))
        .branch(Update::filter_edited_channel_post().endpoint(handle_edited_channel_post));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("polling stopped");
    Ok(())
}

async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    match convert::callback_event(&q) {
        Some(event) => state.spawn(event),
        None => debug!(callback = %q.id, "callback without message, ignored"),
    }
    Ok(())
}

async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    match convert::message_event(&msg) {
        Some(event) => state.spawn(event),
        None => debug!(chat = msg.chat.id.0, "unsupported message kind, ignored"),
    }
    Ok(())
}

async fn handle_channel_post(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    state.spawn(convert::channel_event(&msg, false));
    Ok(())
}

async fn handle_edited_channel_post(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    state.spawn(convert::channel_event(&msg, true));
    Ok(())
}
