//! SQLite persistence layer.
//!
//! RULE: only the store talks to the database. Modules call store
//! methods — they never execute SQL directly.
//!
//! The connection sits behind `Arc<Mutex>` so one store can serve many
//! concurrent callers, but no invariant relies on that lock: every
//! compound read-modify-write runs inside an IMMEDIATE transaction and
//! every balance/limit mutation is a single conditional UPDATE, so the
//! guarantees hold at the database even with multiple processes on the
//! same file.

mod card;
mod security;
mod txn;
mod wallet;

pub use card::{CardRow, CardStatus};
pub use security::{NotificationRow, SecurityEventRow};
pub use txn::{TxnRow, TxnStatus, TxnType};
pub use wallet::{PinRow, WalletRow};

use crate::error::WalletResult;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct WalletStore {
    conn: Arc<Mutex<Connection>>,
}

impl WalletStore {
    pub fn open(path: &str) -> WalletResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> WalletResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> WalletResult<()> {
        self.lock()
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        // Poisoning only happens after a panic in another holder; at that
        // point continuing is worse than crashing.
        self.conn.lock().unwrap()
    }
}
