//! Handler chain building blocks.
//!
//! Feature modules are composed, not inherited: each module implements
//! [`HandlerModule`] and the dispatcher walks them in registration order until
//! one returns a blocking status.

use std::sync::Arc;

use crate::{
    domain::ChatId,
    event::{CallContext, IncomingEvent},
    snapshot::RequestSnapshot,
    state::SharedBotState,
    Result,
};

/// Outcome of one handler in the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleStatus {
    /// Not handled here; keep propagating.
    Passed,
    /// Stop propagating. `normal` tells whether this counts as a successful stop.
    Blocked { normal: bool },
}

impl HandleStatus {
    pub fn blocked() -> Self {
        HandleStatus::Blocked { normal: true }
    }

    /// Stopped without doing the requested work (denied, invalid input, ...).
    pub fn denied() -> Self {
        HandleStatus::Blocked { normal: false }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, HandleStatus::Blocked { .. })
    }

    pub fn is_normal(&self) -> bool {
        match self {
            HandleStatus::Passed => true,
            HandleStatus::Blocked { normal } => *normal,
        }
    }
}

/// `true` means "stop here, all good"; `false` means "keep going".
impl From<bool> for HandleStatus {
    fn from(stop: bool) -> Self {
        if stop {
            HandleStatus::blocked()
        } else {
            HandleStatus::Passed
        }
    }
}

/// A command (or chain) callback: always exactly (event, context) plus the
/// request snapshot standing in for the bot instance.
pub type HandlerFn =
    Arc<dyn Fn(&RequestSnapshot, &IncomingEvent, &CallContext) -> Result<HandleStatus> + Send + Sync>;

/// Wrap a callback returning anything convertible into a status.
pub fn handler_fn<F, R>(f: F) -> HandlerFn
where
    F: Fn(&RequestSnapshot, &IncomingEvent, &CallContext) -> Result<R> + Send + Sync + 'static,
    R: Into<HandleStatus>,
{
    Arc::new(
        move |bot: &RequestSnapshot, event: &IncomingEvent, ctx: &CallContext| {
            f(bot, event, ctx).map(Into::into)
        },
    )
}

/// A feature module taking part in the handler chain.
///
/// Every hook defaults to "not mine" so modules only implement what they need.
pub trait HandlerModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_text(&self, _bot: &RequestSnapshot, _event: &IncomingEvent) -> Result<HandleStatus> {
        Ok(HandleStatus::Passed)
    }

    fn on_button(&self, _bot: &RequestSnapshot, _event: &IncomingEvent) -> Result<HandleStatus> {
        Ok(HandleStatus::Passed)
    }

    fn on_photo(&self, _bot: &RequestSnapshot, _event: &IncomingEvent) -> Result<HandleStatus> {
        Ok(HandleStatus::Passed)
    }

    fn on_channel_post(
        &self,
        _bot: &RequestSnapshot,
        _event: &IncomingEvent,
    ) -> Result<HandleStatus> {
        Ok(HandleStatus::Passed)
    }

    fn on_edited_channel_post(
        &self,
        _bot: &RequestSnapshot,
        _event: &IncomingEvent,
    ) -> Result<HandleStatus> {
        Ok(HandleStatus::Passed)
    }

    /// Move any per-chat state from `old` to `new`. Runs on the real instance.
    fn on_chat_migrate(&self, _old: ChatId, _new: ChatId, _bot: &SharedBotState) -> Result<()> {
        Ok(())
    }

    fn before_stop(&self, _bot: &SharedBotState) -> Result<()> {
        Ok(())
    }

    /// Commands this module answers, as (name, callback).
    fn commands(self: Arc<Self>) -> Vec<(String, HandlerFn)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_results_map_to_statuses() {
        assert_eq!(HandleStatus::from(true), HandleStatus::Blocked { normal: true });
        assert_eq!(HandleStatus::from(false), HandleStatus::Passed);
        assert!(HandleStatus::Passed.is_normal());
        assert!(!HandleStatus::denied().is_normal());
        assert!(HandleStatus::denied().is_blocked());
    }
}
