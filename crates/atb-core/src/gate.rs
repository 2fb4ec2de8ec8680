//! Entry point every handler invocation goes through.
//!
//! `ARITY_CHECK -> SNAPSHOT -> BLACKLIST_CHECK -> {DENIED | RUN_HANDLER}`.
//! The transport hands arguments positionally; the gate insists on exactly
//! (event, context) before touching any state.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    errors::Error,
    event::{CallContext, IncomingEvent},
    handler::{HandleStatus, HandlerFn},
    snapshot::RequestSnapshot,
    state::{BotContext, SharedBotState},
    Result,
};

pub const HANDLER_ARITY: usize = 2;

pub const BLACKLISTED_TEXT: &str = "You are blacklisted and cannot use any feature.";

/// A positional argument as delivered by the transport.
#[derive(Clone, Debug)]
pub enum CallArg {
    Event(IncomingEvent),
    Context(CallContext),
}

/// Which identifiers the blacklist check looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlacklistScope {
    ChatAndUser,
    ChatOnly,
}

/// What a denied caller sees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenyPolicy {
    Reply(String),
    Silent,
}

#[derive(Clone, Debug)]
pub struct GatePolicy {
    pub scope: BlacklistScope,
    pub on_deny: DenyPolicy,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            scope: BlacklistScope::ChatAndUser,
            on_deny: DenyPolicy::Reply(BLACKLISTED_TEXT.to_string()),
        }
    }
}

/// A handler bound to the shared bot state behind the dispatch checks.
#[derive(Clone)]
pub struct Gate {
    name: String,
    state: Arc<SharedBotState>,
    handler: HandlerFn,
    policy: GatePolicy,
}

impl Gate {
    pub fn new(name: impl Into<String>, state: Arc<SharedBotState>, handler: HandlerFn) -> Self {
        Self {
            name: name.into(),
            state,
            handler,
            policy: GatePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler for one event. Handler errors propagate unchanged.
    pub fn call(&self, args: Vec<CallArg>) -> Result<HandleStatus> {
        let (event, ctx) = self.positional(args)?;

        let snapshot = self.state.renew_status(event.identity());
        snapshot.debug_info(&format!("{} invoked", self.name));

        if self.denied(&snapshot)? {
            info!(
                gate = %self.name,
                chat = snapshot.chat_id().0,
                user = snapshot.user_id().0,
                "blacklisted caller rejected"
            );
            if let DenyPolicy::Reply(text) = &self.policy.on_deny {
                snapshot.reply(text)?;
            }
            return Ok(HandleStatus::denied());
        }

        (self.handler)(&snapshot, &event, &ctx)
    }

    fn positional(&self, args: Vec<CallArg>) -> Result<(IncomingEvent, CallContext)> {
        if args.len() != HANDLER_ARITY {
            return Err(Error::Arity {
                expected: HANDLER_ARITY,
                got: args.len(),
            });
        }
        let mut it = args.into_iter();
        match (it.next(), it.next()) {
            (Some(CallArg::Event(event)), Some(CallArg::Context(ctx))) => Ok((event, ctx)),
            _ => Err(Error::External(format!(
                "{}: arguments must be (event, context)",
                self.name
            ))),
        }
    }

    fn denied(&self, snapshot: &RequestSnapshot) -> Result<bool> {
        let chat = snapshot.chat_id().0;
        let ids: Vec<i64> = match self.policy.scope {
            BlacklistScope::ChatOnly => vec![chat],
            BlacklistScope::ChatAndUser => vec![chat, snapshot.user_id().0],
        };
        let denied = self.state.any_blacklisted(&ids)?;
        if !denied {
            debug!(gate = %self.name, "blacklist check passed");
        }
        Ok(denied)
    }
}
