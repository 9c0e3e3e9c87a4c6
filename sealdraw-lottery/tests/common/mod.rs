#![allow(dead_code)]

use sealdraw_core::{
    Address, Amount, EngineSettings, FungibleToken, LedgerToken, ManualClock, TokenRegistry,
};
use sealdraw_lottery::{AdminAuthority, LotteryEngine, MemoryStore, StateStore};
use std::sync::Arc;

pub const START: i64 = 1_700_000_000;
pub const END: i64 = START + 3_600;
pub const PURCHASE_END: i64 = START + 1_800;

pub struct Harness {
    pub engine: Arc<LotteryEngine>,
    pub clock: Arc<ManualClock>,
    pub token: Arc<LedgerToken>,
    pub registry: Arc<TokenRegistry>,
    pub owner: Address,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn StateStore>) -> Self {
        let token = Arc::new(LedgerToken::new("TKN"));
        Self::with_token(store, token.clone(), token)
    }

    /// `endpoint` is what the engine talks to, `token` the ledger behind it.
    pub fn with_token(
        store: Arc<dyn StateStore>,
        token: Arc<LedgerToken>,
        endpoint: Arc<dyn FungibleToken>,
    ) -> Self {
        let owner = Address::from_label("owner");
        let clock = Arc::new(ManualClock::new(START));
        let registry = Arc::new(TokenRegistry::new());
        registry.register(endpoint.clone());

        let engine = Arc::new(
            LotteryEngine::new(
                store,
                registry.clone(),
                clock.clone(),
                EngineSettings::default(),
                owner,
            )
            .unwrap(),
        );
        // a reopened store already has it
        if engine.payment_token().unwrap() != Some(endpoint.address()) {
            engine.set_payment_token(owner, endpoint.address()).unwrap();
        }

        Self {
            engine,
            clock,
            token,
            registry,
            owner,
        }
    }

    /// A buyer with `balance` tokens, all approved for the engine.
    pub fn funded_buyer(&self, label: &str, balance: u64) -> Address {
        let buyer = Address::from_label(label);
        self.token.mint(buyer, Amount::from(balance)).unwrap();
        self.token
            .approve(buyer, self.engine.custody(), Amount::from(balance));
        buyer
    }

    pub fn balance(&self, account: Address) -> Amount {
        self.token.balance_of(account)
    }

    pub fn custody_balance(&self) -> Amount {
        self.token.balance_of(self.engine.custody())
    }
}
