use crate::error::Result;
use crate::storage::{Storage, StorageTransaction};
use crate::token::TokenSnapshot;
use chrono::Utc;
use rusqlite::{params, Connection};

/// Persists local token ledgers as JSON snapshots.
pub struct TokenStore<'a> {
    storage: &'a Storage,
}

impl<'a> TokenStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn save_token(&self, snapshot: &TokenSnapshot) -> Result<()> {
        self.storage
            .with_connection(|conn| write_snapshot(conn, snapshot))
    }

    /// Saves a snapshot as part of an open transaction, so token balances
    /// commit or roll back together with the rest of it.
    pub fn save_token_in(tx: &StorageTransaction<'_>, snapshot: &TokenSnapshot) -> Result<()> {
        tx.with_connection(|conn| write_snapshot(conn, snapshot))
    }

    pub fn load_tokens(&self) -> Result<Vec<TokenSnapshot>> {
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT state FROM tokens ORDER BY symbol ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut tokens = Vec::new();
            for row in rows {
                let snapshot: TokenSnapshot = serde_json::from_str(&row?)?;
                tokens.push(snapshot);
            }
            Ok(tokens)
        })
    }

    pub fn token_exists(&self, symbol: &str) -> Result<bool> {
        self.storage.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tokens WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }
}

fn write_snapshot(conn: &Connection, snapshot: &TokenSnapshot) -> Result<()> {
    let state_json = serde_json::to_string(snapshot)?;
    conn.execute(
        "INSERT OR REPLACE INTO tokens (address, symbol, state, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            snapshot.address.to_string(),
            snapshot.symbol,
            state_json,
            Utc::now().timestamp(),
        ],
    )?;

    tracing::debug!("Saved token {} ({})", snapshot.symbol, snapshot.address);
    Ok(())
}
