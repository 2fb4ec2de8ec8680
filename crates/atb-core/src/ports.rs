use crate::{domain::*, Result};

/// Outbound messaging port.
///
/// Synchronous on purpose: handlers run on blocking worker threads, one event
/// per thread. The Telegram adapter bridges into its async client.
pub trait MessagingPort: Send + Sync {
    /// Send plain text to a chat, optionally as a reply to `reply_to`.
    fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;

    /// Acknowledge an inline button press (optionally with a toast text).
    fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}

/// Read-only view of the permission/blacklist store as seen by the dispatcher.
pub trait PermissionStore: Send + Sync {
    fn is_blacklisted(&self, id: i64) -> Result<bool>;
    fn is_allowed(&self, id: i64) -> Result<bool>;
}

/// Admin side of the store, used by owner commands and chat migration.
pub trait PermissionAdmin: PermissionStore {
    fn blacklist(&self, id: i64) -> Result<()>;
    fn unblacklist(&self, id: i64) -> Result<()>;
    fn allow(&self, id: i64) -> Result<()>;
    fn revoke(&self, id: i64) -> Result<()>;
    fn allowed_ids(&self) -> Result<Vec<i64>>;

    /// Carry an allow-list entry over to a migrated chat id.
    fn migrate_allowed(&self, old: i64, new: i64) -> Result<bool> {
        if !self.is_allowed(old)? {
            return Ok(false);
        }
        self.allow(new)?;
        self.revoke(old)?;
        Ok(true)
    }
}
