use super::{StateStore, StoreTransaction};
use crate::events::{EventRecord, LotteryEvent};
use crate::model::{AdminConfig, Lottery};
use crate::{LotteryError, Result};
use parking_lot::Mutex;
use sealdraw_core::{CoreError, LotteryId, Timestamp};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct MemoryState {
    config: Option<AdminConfig>,
    lotteries: BTreeMap<LotteryId, Lottery>,
    events: Vec<EventRecord>,
}

/// Volatile store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following commit fail, to exercise the paths that run
    /// after an external transfer went through.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

impl StateStore for MemoryStore {
    fn load_config(&self) -> Result<Option<AdminConfig>> {
        Ok(self.state.lock().config)
    }

    fn load_lottery(&self, id: LotteryId) -> Result<Option<Lottery>> {
        Ok(self.state.lock().lotteries.get(&id).cloned())
    }

    fn lottery_count(&self) -> Result<u64> {
        Ok(self.state.lock().lotteries.len() as u64)
    }

    fn events_since(&self, after: u64) -> Result<Vec<EventRecord>> {
        Ok(self
            .state
            .lock()
            .events
            .iter()
            .filter(|record| record.seq > after)
            .cloned()
            .collect())
    }

    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            config: None,
            lotteries: Vec::new(),
            events: Vec::new(),
        }))
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    config: Option<AdminConfig>,
    lotteries: Vec<Lottery>,
    events: Vec<(Timestamp, LotteryEvent)>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn put_config(&mut self, config: &AdminConfig) -> Result<()> {
        self.config = Some(*config);
        Ok(())
    }

    fn put_lottery(&mut self, lottery: &Lottery) -> Result<()> {
        self.lotteries.push(lottery.clone());
        Ok(())
    }

    fn append_event(&mut self, at: Timestamp, event: &LotteryEvent) -> Result<()> {
        self.events.push((at, event.clone()));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        if self.store.fail_commits.load(Ordering::SeqCst) {
            return Err(LotteryError::Core(CoreError::internal(
                "memory store commit refused",
            )));
        }

        let mut state = self.store.state.lock();
        if let Some(config) = self.config {
            state.config = Some(config);
        }
        for lottery in self.lotteries {
            state.lotteries.insert(lottery.id, lottery);
        }
        for (at, event) in self.events {
            let seq = state.events.len() as u64 + 1;
            state.events.push(EventRecord { seq, at, event });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LotteryParams;
    use sealdraw_core::{Address, Amount};

    fn lottery(id: LotteryId) -> Lottery {
        let params = LotteryParams::new(100, 10, 1, 10, Amount::new(1));
        Lottery::new(id, Address::from_label("owner"), 0, params)
    }

    #[test]
    fn test_writes_visible_only_after_commit() {
        let store = MemoryStore::new();

        let mut tx = store.begin().unwrap();
        tx.put_lottery(&lottery(1)).unwrap();
        tx.append_event(5, &LotteryEvent::LotteryCreated { lottery_id: 1 })
            .unwrap();
        assert!(store.load_lottery(1).unwrap().is_none());
        tx.commit().unwrap();

        assert!(store.load_lottery(1).unwrap().is_some());
        assert_eq!(store.lottery_count().unwrap(), 1);

        let events = store.events_since(0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 1);
        assert_eq!(events[0].at, 5);
        assert!(store.events_since(1).unwrap().is_empty());
    }

    #[test]
    fn test_dropped_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().unwrap();
            tx.put_lottery(&lottery(1)).unwrap();
        }
        assert_eq!(store.lottery_count().unwrap(), 0);

        store.set_fail_commits(true);
        let mut tx = store.begin().unwrap();
        tx.put_lottery(&lottery(1)).unwrap();
        assert!(tx.commit().is_err());
        assert_eq!(store.lottery_count().unwrap(), 0);
    }
}
