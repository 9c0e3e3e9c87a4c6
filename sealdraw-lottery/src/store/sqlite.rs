use super::{StateStore, StoreTransaction};
use crate::events::{EventRecord, LotteryEvent};
use crate::model::{AdminConfig, Lottery};
use crate::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use parking_lot::RwLock;
use sealdraw_core::{
    LedgerToken, LotteryId, Storage, StorageTransaction, Timestamp, TokenStore,
};
use std::sync::Arc;

const ADMIN_KEY: &str = "admin";

/// Engine state in the shared SQLite database. Lotteries and the admin
/// configuration are stored as JSON documents.
///
/// Tracked token ledgers are snapshotted into every commit, so a payment
/// and the state change it pays for land in the same transaction.
pub struct SqliteStore {
    storage: Arc<Storage>,
    ledgers: RwLock<Vec<Arc<LedgerToken>>>,
}

impl SqliteStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            ledgers: RwLock::new(Vec::new()),
        }
    }

    pub fn track_ledger(&self, ledger: Arc<LedgerToken>) {
        self.ledgers.write().push(ledger);
    }
}

impl StateStore for SqliteStore {
    fn load_config(&self) -> Result<Option<AdminConfig>> {
        let value = self.storage.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![ADMIN_KEY],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn load_lottery(&self, id: LotteryId) -> Result<Option<Lottery>> {
        let record = self.storage.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT record FROM lotteries WHERE id = ?1",
                    params![id as i64],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;

        match record {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn lottery_count(&self) -> Result<u64> {
        let count = self.storage.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM lotteries", [], |row| {
                row.get::<_, i64>(0)
            })?)
        })?;
        Ok(count as u64)
    }

    fn events_since(&self, after: u64) -> Result<Vec<EventRecord>> {
        let rows = self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, at, payload FROM events WHERE seq > ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![after as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })?;

        let mut records = Vec::with_capacity(rows.len());
        for (seq, at, payload) in rows {
            records.push(EventRecord {
                seq: seq as u64,
                at,
                event: serde_json::from_str(&payload)?,
            });
        }
        Ok(records)
    }

    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>> {
        let tx = self.storage.begin()?;
        Ok(Box::new(SqliteTransaction {
            tx,
            ledgers: self.ledgers.read().clone(),
        }))
    }
}

struct SqliteTransaction<'a> {
    tx: StorageTransaction<'a>,
    ledgers: Vec<Arc<LedgerToken>>,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn put_config(&mut self, config: &AdminConfig) -> Result<()> {
        let json = serde_json::to_string(config)?;
        self.tx.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![ADMIN_KEY, json],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn put_lottery(&mut self, lottery: &Lottery) -> Result<()> {
        let json = serde_json::to_string(lottery)?;
        self.tx.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO lotteries (id, state, record, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    lottery.id as i64,
                    lottery.state.as_str(),
                    json,
                    Utc::now().timestamp(),
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn append_event(&mut self, at: Timestamp, event: &LotteryEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        self.tx.with_connection(|conn| {
            conn.execute(
                "INSERT INTO events (lottery_id, kind, payload, at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.lottery_id().map(|id| id as i64),
                    event.kind(),
                    payload,
                    at,
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        for ledger in &self.ledgers {
            TokenStore::save_token_in(&self.tx, &ledger.snapshot())?;
        }
        self.tx.commit()?;
        Ok(())
    }
}
