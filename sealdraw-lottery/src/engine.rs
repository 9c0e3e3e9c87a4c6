use crate::events::{EventRecord, LotteryEvent};
use crate::model::{AdminConfig, Lottery};
use crate::store::{StateStore, StoreTransaction};
use crate::{LotteryError, Result};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use sealdraw_core::{
    Address, Amount, Clock, CoreError, EngineSettings, FungibleToken, LotteryId, Timestamp,
    TokenDirectory,
};
use std::cell::Cell;
use std::sync::Arc;

/// Admits one mutating operation at a time.
///
/// Other threads block on the lock. A call that comes back in on the
/// thread already inside an operation (a token calling into the engine
/// during a transfer) finds the busy flag set and is rejected.
struct ReentrancyGuard {
    lock: ReentrantMutex<Cell<bool>>,
}

pub(crate) struct OperationGuard<'a> {
    guard: ReentrantMutexGuard<'a, Cell<bool>>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.guard.set(false);
    }
}

impl ReentrancyGuard {
    fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(Cell::new(false)),
        }
    }

    fn enter(&self, operation: &str) -> Result<OperationGuard<'_>> {
        let guard = self.lock.lock();
        if guard.get() {
            tracing::warn!("Rejected re-entrant call to {}", operation);
            return Err(LotteryError::conflict(format!(
                "re-entrant call to {operation} rejected"
            )));
        }
        guard.set(true);
        Ok(OperationGuard { guard })
    }
}

/// Settlement engine. Implements [`crate::LotteryRegistry`],
/// [`crate::TicketSales`], [`crate::WinnerSelection`], [`crate::Escrow`] and
/// [`crate::AdminAuthority`] over one state store.
pub struct LotteryEngine {
    store: Arc<dyn StateStore>,
    tokens: Arc<dyn TokenDirectory>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    custody: Address,
    guard: ReentrancyGuard,
}

impl LotteryEngine {
    /// Opens the engine. A store without admin configuration is initialized
    /// with `deployer` as owner and no payment token; an existing one keeps
    /// its owner.
    pub fn new(
        store: Arc<dyn StateStore>,
        tokens: Arc<dyn TokenDirectory>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
        deployer: Address,
    ) -> Result<Self> {
        settings.validate()?;
        if deployer.is_zero() {
            return Err(LotteryError::validation("deployer cannot be the zero address"));
        }

        if store.load_config()?.is_none() {
            let mut tx = store.begin()?;
            tx.put_config(&AdminConfig {
                owner: deployer,
                payment_token: None,
            })?;
            tx.commit()?;
            tracing::info!("Initialized engine with owner {}", deployer);
        }

        let custody = settings.custody_address();
        tracing::debug!("Engine custody account {}", custody);

        Ok(Self {
            store,
            tokens,
            clock,
            settings,
            custody,
            guard: ReentrancyGuard::new(),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Account holding every lottery's collected payments.
    pub fn custody(&self) -> Address {
        self.custody
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn events_since(&self, after: u64) -> Result<Vec<EventRecord>> {
        self.store.events_since(after)
    }

    pub(crate) fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub(crate) fn tokens(&self) -> &dyn TokenDirectory {
        self.tokens.as_ref()
    }

    pub(crate) fn enter(&self, operation: &str) -> Result<OperationGuard<'_>> {
        self.guard.enter(operation)
    }

    pub(crate) fn load_lottery(&self, id: LotteryId) -> Result<Lottery> {
        self.store
            .load_lottery(id)?
            .ok_or(LotteryError::LotteryNotFound(id))
    }

    pub(crate) fn admin_config(&self) -> Result<AdminConfig> {
        self.store
            .load_config()?
            .ok_or_else(|| LotteryError::Core(CoreError::internal("admin configuration missing")))
    }

    pub(crate) fn require_owner(&self, caller: Address) -> Result<AdminConfig> {
        let config = self.admin_config()?;
        if config.owner != caller {
            return Err(LotteryError::unauthorized(format!(
                "{caller} is not the owner"
            )));
        }
        Ok(config)
    }

    /// Token a lottery settles in: the one pinned at its first purchase,
    /// otherwise the current global setting.
    pub(crate) fn settlement_token_address(&self, lottery: &Lottery) -> Result<Option<Address>> {
        match lottery.payment_token {
            Some(address) => Ok(Some(address)),
            None => Ok(self.admin_config()?.payment_token),
        }
    }

    pub(crate) fn settlement_token(&self, lottery: &Lottery) -> Result<Arc<dyn FungibleToken>> {
        let address = self
            .settlement_token_address(lottery)?
            .ok_or_else(|| LotteryError::transfer("payment token is not configured"))?;
        self.tokens
            .resolve(address)
            .ok_or_else(|| LotteryError::transfer(format!("payment token {address} is unavailable")))
    }

    /// Commits a transaction whose inbound pull already went through. If the
    /// commit fails the pulled funds go back to the payer.
    pub(crate) fn commit_after_pull(
        &self,
        tx: Box<dyn StoreTransaction + '_>,
        token: &dyn FungibleToken,
        payer: Address,
        amount: Amount,
    ) -> Result<()> {
        if let Err(e) = tx.commit() {
            tracing::warn!("Commit failed after pulling {} from {}: {}", amount, payer, e);
            if !token.transfer(self.custody, payer, amount) {
                tracing::error!(
                    "Could not return {} {} to {} after failed commit",
                    amount,
                    token.symbol(),
                    payer
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Pays a claim out of custody.
    ///
    /// `claimed` carries the withdrawn flag and is committed before the
    /// transfer, so a claim is never paid twice. A refused transfer restores
    /// `unclaimed`; the event is appended only once the payment went through.
    pub(crate) fn pay_out(
        &self,
        claimed: &Lottery,
        unclaimed: &Lottery,
        recipient: Address,
        amount: Amount,
        at: Timestamp,
        event: &LotteryEvent,
    ) -> Result<()> {
        let token = if amount.is_zero() {
            None
        } else {
            Some(self.settlement_token(claimed)?)
        };

        let mut tx = self.store.begin()?;
        tx.put_lottery(claimed)?;
        tx.commit()?;

        if let Some(token) = token {
            if !token.transfer(self.custody, recipient, amount) {
                tracing::warn!(
                    "Lottery {}: payment of {} {} to {} failed",
                    claimed.id,
                    amount,
                    token.symbol(),
                    recipient
                );
                let mut tx = self.store.begin()?;
                tx.put_lottery(unclaimed)?;
                if let Err(e) = tx.commit() {
                    tracing::error!(
                        "Lottery {}: claim of {} stays marked withdrawn after failed payment: {}",
                        claimed.id,
                        recipient,
                        e
                    );
                }
                return Err(LotteryError::transfer(format!(
                    "could not pay {amount} {} to {recipient}",
                    token.symbol()
                )));
            }
        }

        let mut tx = self.store.begin()?;
        tx.append_event(at, event)?;
        tx.commit().map_err(|e| {
            tracing::error!(
                "Lottery {}: paid {} to {} but failed to record it: {}",
                claimed.id,
                amount,
                recipient,
                e
            );
            e
        })
    }
}
