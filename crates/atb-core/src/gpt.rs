//! Conversation sessions against the local GPT proxy.
//!
//! A session is keyed by the message that started it; every bot reply in the
//! thread is registered under the same session, so replying to any of them
//! continues the conversation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::{domain::EntityKey, errors::Error, sync::lock_unpoisoned, Result};

/// Backend able to host conversation sessions.
pub trait GptBackend: Send + Sync {
    /// Allocate a fresh session id.
    fn new_session_id(&self) -> Result<i64>;
    /// Make `sid` usable for `ask`.
    fn create(&self, sid: i64) -> Result<()>;
    fn ask(&self, sid: i64, content: &str) -> Result<String>;
}

#[derive(Debug)]
struct ProxySession {
    sid: i64,
    created_at: DateTime<Utc>,
}

/// One backend session; calls on it are serialized.
#[derive(Debug)]
struct CallingProxy {
    session: Mutex<ProxySession>,
}

impl CallingProxy {
    fn open(backend: &dyn GptBackend, sid: i64) -> Result<Self> {
        backend.create(sid)?;
        Ok(Self {
            session: Mutex::new(ProxySession {
                sid,
                created_at: Utc::now(),
            }),
        })
    }

    fn call(
        &self,
        backend: &dyn GptBackend,
        content: &str,
        max_age: Option<Duration>,
    ) -> Result<String> {
        let mut session = lock_unpoisoned(&self.session);
        if let Some(max_age) = max_age {
            if Utc::now() - session.created_at > max_age {
                debug!(sid = session.sid, "session expired, renewing");
                let sid = backend.new_session_id()?;
                backend.create(sid)?;
                *session = ProxySession {
                    sid,
                    created_at: Utc::now(),
                };
            }
        }
        backend.ask(session.sid, content)
    }

    fn sid(&self) -> i64 {
        lock_unpoisoned(&self.session).sid
    }
}

/// Maps message keys to backend sessions.
pub struct SessionKeeper {
    backend: Arc<dyn GptBackend>,
    sessions: Mutex<HashMap<EntityKey, Arc<CallingProxy>>>,
    max_age: Option<Duration>,
}

impl SessionKeeper {
    pub fn new(backend: Arc<dyn GptBackend>) -> Self {
        Self {
            backend,
            sessions: Mutex::new(HashMap::new()),
            max_age: None,
        }
    }

    /// Renew a session on its next call once it is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Ask within the session of `key`, opening one if none exists.
    pub fn call(&self, key: EntityKey, content: &str) -> Result<String> {
        let proxy = {
            let mut sessions = lock_unpoisoned(&self.sessions);
            match sessions.get(&key) {
                Some(p) => Arc::clone(p),
                None => {
                    let sid = self.backend.new_session_id()?;
                    let proxy = Arc::new(CallingProxy::open(self.backend.as_ref(), sid)?);
                    info!(%key, sid, "gpt session opened");
                    sessions.insert(key, Arc::clone(&proxy));
                    proxy
                }
            }
        };
        proxy.call(self.backend.as_ref(), content, self.max_age)
    }

    /// Ask within an existing session only.
    pub fn ensure_id_call(&self, key: EntityKey, content: &str) -> Result<String> {
        let proxy = self.existing(key)?;
        proxy.call(self.backend.as_ref(), content, self.max_age)
    }

    /// Make `next` continue the session of `prev`.
    pub fn register_session(&self, prev: EntityKey, next: EntityKey) -> Result<()> {
        let mut sessions = lock_unpoisoned(&self.sessions);
        let proxy = sessions
            .get(&prev)
            .cloned()
            .ok_or(Error::SessionNotFound(prev))?;
        debug!(%prev, %next, "gpt session extended");
        sessions.insert(next, proxy);
        Ok(())
    }

    pub fn session_id(&self, key: EntityKey) -> Option<i64> {
        lock_unpoisoned(&self.sessions).get(&key).map(|p| p.sid())
    }

    fn existing(&self, key: EntityKey) -> Result<Arc<CallingProxy>> {
        lock_unpoisoned(&self.sessions)
            .get(&key)
            .cloned()
            .ok_or(Error::SessionNotFound(key))
    }

    /// Strip the leading `/gpt` (and any `@bot` suffix) from a command text.
    pub fn process_message(text: &str) -> String {
        let text = text.trim();
        let Some(rest) = text.strip_prefix("/gpt") else {
            return text.to_string();
        };
        let rest = match rest.strip_prefix('@') {
            Some(mention) => mention.split_once(char::is_whitespace).map_or("", |(_, r)| r),
            None => rest,
        };
        rest.trim().to_string()
    }
}
