//! SQLite-backed permission store.
//!
//! Two single-table databases: `BLACKLIST` (denied chats and users) and `GPT`
//! (chats allowed to use GPT). Every operation opens its own connection under
//! the store lock and closes it on return.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::{
    errors::Error,
    ports::{PermissionAdmin, PermissionStore},
    sync::lock_unpoisoned,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Table {
    Blacklist,
    Gpt,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Blacklist => "BLACKLIST",
            Table::Gpt => "GPT",
        }
    }
}

#[derive(Debug)]
pub struct SqlitePermissionStore {
    blacklist_db: PathBuf,
    gpt_db: PathBuf,
    lock: Mutex<()>,
}

impl SqlitePermissionStore {
    /// Open both databases, creating parent directories and tables if needed.
    pub fn open(blacklist_db: impl AsRef<Path>, gpt_db: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            blacklist_db: blacklist_db.as_ref().to_path_buf(),
            gpt_db: gpt_db.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };
        for table in [Table::Blacklist, Table::Gpt] {
            if let Some(parent) = store.path(table).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            store.with_connection(table, |conn| {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (TGID INT PRIMARY KEY);",
                    table.name()
                ))
            })?;
        }
        info!(
            blacklist = %store.blacklist_db.display(),
            gpt = %store.gpt_db.display(),
            "permission store ready"
        );
        Ok(store)
    }

    fn path(&self, table: Table) -> &Path {
        match table {
            Table::Blacklist => &self.blacklist_db,
            Table::Gpt => &self.gpt_db,
        }
    }

    fn with_connection<T>(
        &self,
        table: Table,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let _guard = lock_unpoisoned(&self.lock);
        let path = self.path(table);
        let conn = Connection::open(path)
            .map_err(|e| Error::StoreUnavailable(format!("{}: {e}", path.display())))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(f(&conn)?)
    }

    fn contains(&self, table: Table, id: i64) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE TGID = ?1", table.name());
        self.with_connection(table, |conn| {
            conn.query_row(&sql, params![id], |_| Ok(()))
                .optional()
                .map(|row| row.is_some())
        })
    }

    fn insert(&self, table: Table, id: i64) -> Result<()> {
        let sql = format!("INSERT OR REPLACE INTO {} (TGID) VALUES (?1)", table.name());
        self.with_connection(table, |conn| conn.execute(&sql, params![id]))?;
        debug!(table = table.name(), id, "row inserted");
        Ok(())
    }

    fn delete(&self, table: Table, id: i64) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE TGID = ?1", table.name());
        self.with_connection(table, |conn| conn.execute(&sql, params![id]))?;
        debug!(table = table.name(), id, "row deleted");
        Ok(())
    }

    fn ids(&self, table: Table) -> Result<Vec<i64>> {
        let sql = format!("SELECT TGID FROM {} ORDER BY TGID", table.name());
        self.with_connection(table, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            rows.collect()
        })
    }
}

impl PermissionStore for SqlitePermissionStore {
    fn is_blacklisted(&self, id: i64) -> Result<bool> {
        self.contains(Table::Blacklist, id)
    }

    fn is_allowed(&self, id: i64) -> Result<bool> {
        self.contains(Table::Gpt, id)
    }
}

impl PermissionAdmin for SqlitePermissionStore {
    fn blacklist(&self, id: i64) -> Result<()> {
        self.insert(Table::Blacklist, id)
    }

    fn unblacklist(&self, id: i64) -> Result<()> {
        self.delete(Table::Blacklist, id)
    }

    fn allow(&self, id: i64) -> Result<()> {
        self.insert(Table::Gpt, id)
    }

    fn revoke(&self, id: i64) -> Result<()> {
        self.delete(Table::Gpt, id)
    }

    fn allowed_ids(&self) -> Result<Vec<i64>> {
        self.ids(Table::Gpt)
    }
}
