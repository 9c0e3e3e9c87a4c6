use super::FungibleToken;
use crate::error::{CoreError, Result};
use crate::types::{Address, Amount};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct TokenState {
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
}

/// In-process fungible token with balances and allowances.
///
/// `set_fail_transfers(true)` makes every transfer report failure, which is
/// how transfer-failure paths are exercised.
#[derive(Debug)]
pub struct LedgerToken {
    address: Address,
    symbol: String,
    state: RwLock<TokenState>,
    fail_transfers: AtomicBool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub account: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceEntry {
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// Serializable copy of a token's full state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub address: Address,
    pub symbol: String,
    pub balances: Vec<BalanceEntry>,
    pub allowances: Vec<AllowanceEntry>,
    #[serde(default)]
    pub fail_transfers: bool,
}

impl LedgerToken {
    /// Token whose address is derived from its symbol.
    pub fn new(symbol: &str) -> Self {
        Self::with_address(Address::from_label(&format!("token:{symbol}")), symbol)
    }

    pub fn with_address(address: Address, symbol: &str) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            state: RwLock::new(TokenState::default()),
            fail_transfers: AtomicBool::new(false),
        }
    }

    pub fn from_snapshot(snapshot: TokenSnapshot) -> Self {
        let mut state = TokenState::default();
        for entry in snapshot.balances {
            state.balances.insert(entry.account, entry.amount);
        }
        for entry in snapshot.allowances {
            state
                .allowances
                .insert((entry.owner, entry.spender), entry.amount);
        }

        Self {
            address: snapshot.address,
            symbol: snapshot.symbol,
            state: RwLock::new(state),
            fail_transfers: AtomicBool::new(snapshot.fail_transfers),
        }
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        let state = self.state.read();
        TokenSnapshot {
            address: self.address,
            symbol: self.symbol.clone(),
            balances: state
                .balances
                .iter()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(account, amount)| BalanceEntry {
                    account: *account,
                    amount: *amount,
                })
                .collect(),
            allowances: state
                .allowances
                .iter()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|((owner, spender), amount)| AllowanceEntry {
                    owner: *owner,
                    spender: *spender,
                    amount: *amount,
                })
                .collect(),
            fail_transfers: self.fail_transfers.load(Ordering::SeqCst),
        }
    }

    pub fn mint(&self, to: Address, amount: Amount) -> Result<Amount> {
        let mut state = self.state.write();
        let balance = state.balances.entry(to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| CoreError::overflow(format!("minting {amount} to {to}")))?;

        tracing::info!("Minted {} {} to {}", amount, self.symbol, to);
        Ok(*balance)
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn total_supply(&self) -> Amount {
        self.state
            .read()
            .balances
            .values()
            .fold(Amount::ZERO, |acc, amount| {
                acc.checked_add(*amount).unwrap_or(Amount::new(u128::MAX))
            })
    }

    fn move_balance(state: &mut TokenState, from: Address, to: Address, amount: Amount) -> bool {
        let from_balance = state.balances.get(&from).copied().unwrap_or_default();
        let Some(remaining) = from_balance.checked_sub(amount) else {
            return false;
        };
        let to_balance = state.balances.get(&to).copied().unwrap_or_default();
        if from != to && to_balance.checked_add(amount).is_none() {
            return false;
        }

        state.balances.insert(from, remaining);
        let to_balance = state.balances.get(&to).copied().unwrap_or_default();
        if let Some(credited) = to_balance.checked_add(amount) {
            state.balances.insert(to, credited);
        }
        true
    }
}

impl FungibleToken for LedgerToken {
    fn address(&self) -> Address {
        self.address
    }

    fn symbol(&self) -> String {
        self.symbol.clone()
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> bool {
        if self.fail_transfers.load(Ordering::SeqCst) {
            tracing::warn!("{}: transfer_from refused (failure switch on)", self.symbol);
            return false;
        }

        let mut state = self.state.write();
        let allowance = state
            .allowances
            .get(&(from, spender))
            .copied()
            .unwrap_or_default();
        let Some(left) = allowance.checked_sub(amount) else {
            tracing::warn!(
                "{}: allowance {} of {} for {} below {}",
                self.symbol,
                allowance,
                from,
                spender,
                amount
            );
            return false;
        };

        if !Self::move_balance(&mut state, from, to, amount) {
            tracing::warn!("{}: balance of {} below {}", self.symbol, from, amount);
            return false;
        }
        state.allowances.insert((from, spender), left);
        true
    }

    fn transfer(&self, from: Address, to: Address, amount: Amount) -> bool {
        if self.fail_transfers.load(Ordering::SeqCst) {
            tracing::warn!("{}: transfer refused (failure switch on)", self.symbol);
            return false;
        }

        let mut state = self.state.write();
        Self::move_balance(&mut state, from, to, amount)
    }

    fn approve(&self, owner: Address, spender: Address, amount: Amount) -> bool {
        self.state.write().allowances.insert((owner, spender), amount);
        tracing::debug!("{}: {} approved {} for {}", self.symbol, owner, spender, amount);
        true
    }

    fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.state
            .read()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn balance_of(&self, account: Address) -> Amount {
        self.state
            .read()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded() -> (LedgerToken, Address, Address) {
        let token = LedgerToken::new("TKN");
        let alice = Address::from_label("alice");
        let engine = Address::from_label("engine");
        token.mint(alice, Amount::new(1_000)).unwrap();
        (token, alice, engine)
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let (token, alice, engine) = funded();

        assert!(!token.transfer_from(engine, alice, engine, Amount::new(10)));

        token.approve(alice, engine, Amount::new(100));
        assert!(token.transfer_from(engine, alice, engine, Amount::new(60)));
        assert_eq!(token.allowance(alice, engine), Amount::new(40));
        assert_eq!(token.balance_of(engine), Amount::new(60));
        assert_eq!(token.balance_of(alice), Amount::new(940));

        assert!(!token.transfer_from(engine, alice, engine, Amount::new(41)));
    }

    #[test]
    fn test_transfer_rejects_overdraft_and_failure_switch() {
        let (token, alice, engine) = funded();

        assert!(!token.transfer(alice, engine, Amount::new(1_001)));
        assert!(token.transfer(alice, engine, Amount::new(1_000)));

        token.set_fail_transfers(true);
        assert!(!token.transfer(engine, alice, Amount::new(1)));
        assert_eq!(token.balance_of(engine), Amount::new(1_000));
    }

    #[test]
    fn test_snapshot_restores_state() {
        let (token, alice, engine) = funded();
        token.approve(alice, engine, Amount::new(5));

        let json = serde_json::to_string(&token.snapshot()).unwrap();
        let restored = LedgerToken::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.address(), token.address());
        assert_eq!(restored.balance_of(alice), Amount::new(1_000));
        assert_eq!(restored.allowance(alice, engine), Amount::new(5));
        assert_eq!(restored.total_supply(), Amount::new(1_000));
    }
}
