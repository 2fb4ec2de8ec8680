use std::sync::Arc;

use teloxide::Bot;
use tracing::info;

use atb_core::{
    config::Config,
    dispatcher::Dispatcher,
    errors::Error,
    gpt::SessionKeeper,
    handler::HandlerModule,
    modules::{AdminModule, GptModule, StartModule},
    ports::PermissionAdmin,
    state::SharedBotState,
    store::SqlitePermissionStore,
};
use atb_gpt::GptProxyClient;
use atb_telegram::TelegramMessenger;

fn build_bot(cfg: &Config) -> Result<Bot, Error> {
    let Some(url) = &cfg.telegram_proxy_url else {
        return Ok(Bot::new(cfg.telegram_bot_token.clone()));
    };
    let proxy = reqwest::Proxy::all(url)
        .map_err(|e| Error::Config(format!("invalid TELEGRAM_PROXY_URL: {e}")))?;
    let client = teloxide::net::default_reqwest_settings()
        .proxy(proxy)
        .build()
        .map_err(|e| Error::Config(format!("telegram client build error: {e}")))?;
    Ok(Bot::with_client(cfg.telegram_bot_token.clone(), client))
}

// Not `#[tokio::main]`: the blocking GPT client must be built and dropped
// outside the async runtime.
fn main() -> Result<(), Error> {
    atb_core::logging::init("atb")?;
    let cfg = Config::load()?;

    let store = Arc::new(SqlitePermissionStore::open(
        &cfg.blacklist_database,
        &cfg.gpt_database,
    )?);
    info!(chats = store.allowed_ids()?.len(), "gpt allow list loaded");
    let gpt = Arc::new(GptProxyClient::new(cfg.gpt_proxy_base(), cfg.gpt_timeout)?);
    let keeper = Arc::new(SessionKeeper::new(gpt.clone()));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let bot = build_bot(&cfg)?;
    let messenger = Arc::new(TelegramMessenger::new(bot.clone(), rt.handle().clone()));
    let state = Arc::new(SharedBotState::new(
        cfg.owner_id,
        messenger,
        store.clone(),
        cfg.button_lock_delay,
    ));

    let modules: Vec<Arc<dyn HandlerModule>> = vec![
        Arc::new(StartModule::new(cfg.start_command.clone())),
        Arc::new(AdminModule::new(store.clone())),
        Arc::new(GptModule::new(keeper, store)),
    ];
    let dispatcher = Arc::new(Dispatcher::new(state, modules));

    rt.block_on(atb_telegram::router::run_polling(bot, Arc::clone(&dispatcher)))
        .map_err(|e| Error::External(format!("telegram bot failed: {e}")))?;

    dispatcher.before_stop();
    drop(rt);
    info!("bye");
    Ok(())
}
