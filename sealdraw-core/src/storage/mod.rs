pub mod token_store;

pub use token_store::TokenStore;

use crate::error::{CoreError, Result};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;

/// SQLite database shared by the engine state and the local token ledger.
///
/// The connection sits behind a re-entrant lock: a thread that holds an open
/// [`StorageTransaction`] can still run reads on the same connection (and
/// sees its own uncommitted writes), while other threads wait.
pub struct Storage {
    conn: ReentrantMutex<RefCell<Connection>>,
}

impl Storage {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: ReentrantMutex::new(RefCell::new(conn)),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            // Global settings (owner, payment token)
            conn.execute(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )",
                [],
            )?;

            // Lottery records, one JSON document per lottery
            conn.execute(
                "CREATE TABLE IF NOT EXISTS lotteries (
                    id INTEGER PRIMARY KEY,
                    state TEXT NOT NULL,
                    record TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                [],
            )?;

            // Append-only event log
            conn.execute(
                "CREATE TABLE IF NOT EXISTS events (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    lottery_id INTEGER,
                    kind TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    at INTEGER NOT NULL
                )",
                [],
            )?;

            // Local token ledgers
            conn.execute(
                "CREATE TABLE IF NOT EXISTS tokens (
                    address TEXT PRIMARY KEY,
                    symbol TEXT NOT NULL,
                    state TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                [],
            )?;

            Ok(())
        })
    }

    /// Runs `f` against the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard
            .try_borrow()
            .map_err(|_| CoreError::internal("connection is busy"))?;
        f(&conn)
    }

    /// Opens a write transaction. It rolls back when dropped without
    /// [`StorageTransaction::commit`].
    pub fn begin(&self) -> Result<StorageTransaction<'_>> {
        let guard = self.conn.lock();
        guard
            .try_borrow()
            .map_err(|_| CoreError::internal("connection is busy"))?
            .execute_batch("BEGIN IMMEDIATE")?;

        Ok(StorageTransaction {
            guard,
            finished: false,
        })
    }
}

pub struct StorageTransaction<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<Connection>>,
    finished: bool,
}

impl StorageTransaction<'_> {
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .guard
            .try_borrow()
            .map_err(|_| CoreError::internal("connection is busy"))?;
        f(&conn)
    }

    pub fn commit(mut self) -> Result<()> {
        self.with_connection(|conn| Ok(conn.execute_batch("COMMIT")?))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for StorageTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(conn) = self.guard.try_borrow() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!("Failed to roll back storage transaction: {}", e);
            }
        }
    }
}
