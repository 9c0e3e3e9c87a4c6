pub mod ledger_token;

pub use ledger_token::{LedgerToken, TokenSnapshot};

use crate::types::{Address, Amount};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Fungible token endpoint the engine moves funds through.
///
/// Every mutating call reports success as a `bool` so callers can abort
/// their own operation when the token refuses. The acting identity is
/// passed explicitly: `spender` for `transfer_from`, `from` for `transfer`.
pub trait FungibleToken: Send + Sync {
    fn address(&self) -> Address;

    fn symbol(&self) -> String;

    fn transfer_from(&self, spender: Address, from: Address, to: Address, amount: Amount)
        -> bool;

    fn transfer(&self, from: Address, to: Address, amount: Amount) -> bool;

    fn approve(&self, owner: Address, spender: Address, amount: Amount) -> bool;

    fn allowance(&self, owner: Address, spender: Address) -> Amount;

    fn balance_of(&self, account: Address) -> Amount;
}

/// Resolves token addresses to live endpoints. An address that does not
/// resolve is not a token.
pub trait TokenDirectory: Send + Sync {
    fn resolve(&self, address: Address) -> Option<Arc<dyn FungibleToken>>;
}

/// In-process directory of registered tokens.
#[derive(Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<Address, Arc<dyn FungibleToken>>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: Arc<dyn FungibleToken>) {
        let address = token.address();
        tracing::debug!("Registered token {} at {}", token.symbol(), address);
        self.tokens.write().insert(address, token);
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.tokens.read().keys().copied().collect();
        addresses.sort();
        addresses
    }
}

impl TokenDirectory for TokenRegistry {
    fn resolve(&self, address: Address) -> Option<Arc<dyn FungibleToken>> {
        self.tokens.read().get(&address).cloned()
    }
}
