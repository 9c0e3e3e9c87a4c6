pub mod admin;
pub mod events;
pub mod lottery;
pub mod ticket;
pub mod token;

pub use admin::{handle_admin_command, AdminCommands};
pub use events::handle_events_command;
pub use lottery::{handle_lottery_command, LotteryCommands};
pub use ticket::{handle_ticket_command, TicketCommands};
pub use token::{handle_token_command, TokenCommands};

use crate::config::CliConfig;
use anyhow::{anyhow, Context as _};
use sealdraw_core::{
    Address, Clock, FungibleToken, LedgerToken, ManualClock, Storage, SystemClock, Timestamp,
    TokenRegistry, TokenStore,
};
use chrono::DateTime;
use sealdraw_lottery::{LotteryEngine, SqliteStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DB_FILE: &str = "sealdraw.db";

/// Everything a command needs: the engine over the data directory, the
/// local token ledgers and the acting identity.
pub struct Context {
    pub engine: LotteryEngine,
    pub caller: Address,
    pub data_dir: PathBuf,
    storage: Arc<Storage>,
    store: Arc<SqliteStore>,
    registry: Arc<TokenRegistry>,
    ledgers: BTreeMap<String, Arc<LedgerToken>>,
}

impl Context {
    pub fn open(
        data_dir: &Path,
        config: &CliConfig,
        identity: Option<&str>,
        at: Option<Timestamp>,
    ) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(&data_dir.join(DB_FILE))?);

        let store = Arc::new(SqliteStore::new(storage.clone()));
        let registry = Arc::new(TokenRegistry::new());
        let mut ledgers = BTreeMap::new();
        for snapshot in TokenStore::new(&storage).load_tokens()? {
            let token = Arc::new(LedgerToken::from_snapshot(snapshot));
            registry.register(token.clone());
            store.track_ledger(token.clone());
            ledgers.insert(token.symbol(), token);
        }

        let clock: Arc<dyn Clock> = match at {
            Some(at) => Arc::new(ManualClock::new(at)),
            None => Arc::new(SystemClock),
        };
        let caller = parse_identity(identity.unwrap_or(&config.identity))?;

        let engine = LotteryEngine::new(
            store.clone(),
            registry.clone(),
            clock,
            config.engine.clone(),
            caller,
        )?;

        tracing::debug!("Opened {} as {}", data_dir.display(), caller);
        Ok(Self {
            engine,
            caller,
            data_dir: data_dir.to_path_buf(),
            storage,
            store,
            registry,
            ledgers,
        })
    }

    /// Looks a local token up by symbol or address.
    pub fn ledger(&self, token: &str) -> anyhow::Result<Arc<LedgerToken>> {
        if let Some(ledger) = self.ledgers.get(token) {
            return Ok(ledger.clone());
        }
        let address: Address = token
            .parse()
            .map_err(|_| anyhow!("unknown token '{}', see 'sealdraw token list'", token))?;
        self.ledgers
            .values()
            .find(|ledger| ledger.address() == address)
            .cloned()
            .ok_or_else(|| anyhow!("no local token at {}", address))
    }

    pub fn ledgers(&self) -> impl Iterator<Item = &Arc<LedgerToken>> {
        self.ledgers.values()
    }

    pub fn deploy_token(&mut self, symbol: &str) -> anyhow::Result<Arc<LedgerToken>> {
        if TokenStore::new(&self.storage).token_exists(symbol)? || self.ledgers.contains_key(symbol)
        {
            return Err(anyhow!("token {} already exists", symbol));
        }
        let token = Arc::new(LedgerToken::new(symbol));
        self.registry.register(token.clone());
        self.store.track_ledger(token.clone());
        self.ledgers.insert(symbol.to_string(), token.clone());
        Ok(token)
    }

    /// Writes every token ledger back to the database in one transaction.
    /// Engine commits save them on their own; this covers changes made
    /// outside the engine (mint, approve, deploy).
    pub fn save_tokens(&self) -> anyhow::Result<()> {
        let tx = self.storage.begin()?;
        for ledger in self.ledgers.values() {
            TokenStore::save_token_in(&tx, &ledger.snapshot())
                .with_context(|| format!("saving token {}", ledger.symbol()))?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// `0x`-prefixed addresses are used as is, anything else is a label.
pub fn parse_identity(identity: &str) -> anyhow::Result<Address> {
    let address = if identity.starts_with("0x") {
        identity.parse::<Address>()?
    } else if identity.is_empty() {
        return Err(anyhow!("identity cannot be empty"));
    } else {
        Address::from_label(identity)
    };
    Ok(address)
}

pub fn format_time(at: Timestamp) -> String {
    DateTime::from_timestamp(at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| at.to_string())
}
