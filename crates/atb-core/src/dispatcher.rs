use std::{collections::HashMap, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    domain::ChatId,
    errors::Error,
    event::{CallContext, EventKind, IncomingEvent},
    gate::{BlacklistScope, CallArg, DenyPolicy, Gate, GatePolicy, BLACKLISTED_TEXT},
    handler::{handler_fn, HandleStatus, HandlerFn, HandlerModule},
    snapshot::RequestSnapshot,
    state::{BotContext, SharedBotState, QUERY_ERROR_TEXT},
    Result,
};

pub const TOO_FAST_TEXT: &str = "You clicked too fast! Please press the button again.";
pub const FAILED_TEXT: &str = "Execution failed...";

type Modules = Arc<[Arc<dyn HandlerModule>]>;

/// Routes inbound events through their gate and down the module chain.
pub struct Dispatcher {
    state: Arc<SharedBotState>,
    modules: Modules,
    commands: HashMap<String, Gate>,
    text: Gate,
    button: Gate,
    photo: Gate,
    channel: Gate,
}

impl Dispatcher {
    pub fn new(state: Arc<SharedBotState>, modules: Vec<Arc<dyn HandlerModule>>) -> Self {
        let modules: Modules = modules.into();

        let mut commands = HashMap::new();
        for module in modules.iter() {
            for (name, f) in Arc::clone(module).commands() {
                let gate = Gate::new(format!("/{name}"), Arc::clone(&state), f);
                if commands.insert(name.clone(), gate).is_some() {
                    warn!("command /{name} registered twice, {} wins", module.name());
                }
            }
        }

        let text = Gate::new(
            "text",
            Arc::clone(&state),
            chain(Arc::clone(&modules), |m, bot, ev| m.on_text(bot, ev)),
        );
        let button = Gate::new(
            "button",
            Arc::clone(&state),
            debounced(chain(Arc::clone(&modules), |m, bot, ev| m.on_button(bot, ev))),
        )
        .with_policy(GatePolicy {
            scope: BlacklistScope::ChatAndUser,
            on_deny: DenyPolicy::Reply(QUERY_ERROR_TEXT.to_string()),
        });
        let photo = Gate::new(
            "photo",
            Arc::clone(&state),
            chain(Arc::clone(&modules), |m, bot, ev| m.on_photo(bot, ev)),
        )
        .with_policy(GatePolicy {
            scope: BlacklistScope::ChatOnly,
            on_deny: DenyPolicy::Reply(BLACKLISTED_TEXT.to_string()),
        });
        let channel = Gate::new(
            "channel",
            Arc::clone(&state),
            chain(Arc::clone(&modules), |m, bot, ev| match ev.kind {
                EventKind::EditedChannelPost { .. } => m.on_edited_channel_post(bot, ev),
                _ => m.on_channel_post(bot, ev),
            }),
        )
        .with_policy(GatePolicy {
            scope: BlacklistScope::ChatOnly,
            on_deny: DenyPolicy::Silent,
        });

        info!(
            modules = modules.len(),
            commands = commands.len(),
            "dispatcher ready"
        );

        Self {
            state,
            modules,
            commands,
            text,
            button,
            photo,
            channel,
        }
    }

    pub fn state(&self) -> &Arc<SharedBotState> {
        &self.state
    }

    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Route one event. Handler errors propagate to the caller.
    pub fn dispatch(&self, event: IncomingEvent) -> Result<HandleStatus> {
        match &event.kind {
            EventKind::Command { name, .. } => {
                let Some(gate) = self.commands.get(name.as_str()) else {
                    debug!("unknown command /{name}, ignored");
                    return Ok(HandleStatus::Passed);
                };
                run(gate, event)
            }
            EventKind::ChatMigrate { from } => {
                let (old, new) = (*from, event.chat_id);
                self.state.renew_status(event.identity());
                self.chat_migrate(old, new)?;
                Ok(HandleStatus::blocked())
            }
            EventKind::Text { .. } => run(&self.text, event),
            EventKind::Button { callback_id, .. } => {
                self.state.messenger().answer_callback(callback_id, None)?;
                run(&self.button, event)
            }
            EventKind::Photo { .. } => run(&self.photo, event),
            EventKind::ChannelPost { .. } | EventKind::EditedChannelPost { .. } => {
                run(&self.channel, event)
            }
        }
    }

    /// Transport-facing wrapper: log failures and tell the chat something broke.
    pub fn handle(&self, event: IncomingEvent) -> HandleStatus {
        let identity = event.identity();
        match self.dispatch(event) {
            Ok(status) => status,
            Err(e) => {
                error!(chat = identity.chat_id.0, user = identity.user_id.0, "handler failed: {e}");
                if let Err(send_err) =
                    self.state
                        .messenger()
                        .send_text(identity.chat_id, FAILED_TEXT, identity.message_id)
                {
                    warn!("failed to report handler failure: {send_err}");
                }
                HandleStatus::denied()
            }
        }
    }

    /// Run every module's migration hook; all run even if some fail.
    pub fn chat_migrate(&self, old: ChatId, new: ChatId) -> Result<()> {
        info!("chat migrate {} -> {}", old.0, new.0);
        let mut errs: Vec<Error> = Vec::new();
        for module in self.modules.iter() {
            if let Err(e) = module.on_chat_migrate(old, new, &self.state) {
                warn!(module = module.name(), "chat migrate failed: {e}");
                errs.push(e);
            }
        }
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            _ => Err(Error::Migration(errs.iter().map(|e| e.to_string()).collect())),
        }
    }

    pub fn before_stop(&self) {
        info!("stop requested, running stop hooks");
        for module in self.modules.iter() {
            if let Err(e) = module.before_stop(&self.state) {
                warn!(module = module.name(), "stop hook failed: {e}");
            }
        }
    }
}

fn run(gate: &Gate, event: IncomingEvent) -> Result<HandleStatus> {
    let ctx = CallContext::for_event(&event);
    gate.call(vec![CallArg::Event(event), CallArg::Context(ctx)])
}

/// Walk `modules` in order until one blocks.
fn chain<F>(modules: Modules, hook: F) -> HandlerFn
where
    F: Fn(&dyn HandlerModule, &RequestSnapshot, &IncomingEvent) -> Result<HandleStatus>
        + Send
        + Sync
        + 'static,
{
    handler_fn(move |bot, event, _ctx| {
        for module in modules.iter() {
            let status = hook(module.as_ref(), bot, event)?;
            if status.is_blocked() {
                bot.debug_info(&format!("handled by {}", module.name()));
                return Ok(status);
            }
        }
        Ok(HandleStatus::Passed)
    })
}

/// Guard a button chain with the per-message debounce lock.
///
/// Contention is rejected with a notice instead of queuing the press.
fn debounced(walk: HandlerFn) -> HandlerFn {
    handler_fn(move |bot, event, ctx| {
        let Some(key) = bot.identity().entity() else {
            return bot.query_error();
        };
        let handle = bot.shared().button_locks().lock_for(key);
        let Some(_guard) = handle.try_enter() else {
            return bot.error_info(TOO_FAST_TEXT);
        };

        let status = walk(bot, event, ctx)?;
        if status.is_blocked() {
            return Ok(status);
        }
        bot.query_error()
    })
}
