//! Persistent engine state.
//!
//! Every mutating engine call stages its writes in one
//! [`StoreTransaction`]. Nothing becomes visible before `commit`, and a
//! transaction dropped without committing leaves no trace.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::events::{EventRecord, LotteryEvent};
use crate::model::{AdminConfig, Lottery};
use crate::Result;
use sealdraw_core::{LotteryId, Timestamp};

pub trait StateStore: Send + Sync {
    fn load_config(&self) -> Result<Option<AdminConfig>>;

    fn load_lottery(&self, id: LotteryId) -> Result<Option<Lottery>>;

    /// Number of lotteries created. Ids run from 1 to this value.
    fn lottery_count(&self) -> Result<u64>;

    /// Log entries with `seq` greater than `after`, oldest first.
    fn events_since(&self, after: u64) -> Result<Vec<EventRecord>>;

    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>>;
}

pub trait StoreTransaction {
    fn put_config(&mut self, config: &AdminConfig) -> Result<()>;

    fn put_lottery(&mut self, lottery: &Lottery) -> Result<()>;

    fn append_event(&mut self, at: Timestamp, event: &LotteryEvent) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;
}
