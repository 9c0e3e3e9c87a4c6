use crate::engine::LotteryEngine;
use crate::events::LotteryEvent;
use crate::{LotteryError, Result};
use sealdraw_core::Address;

/// Owner identity and the global payment token.
pub trait AdminAuthority {
    fn owner(&self) -> Result<Address>;

    fn payment_token(&self) -> Result<Option<Address>>;

    /// Owner-only. Hands ownership to `new_owner`.
    fn set_owner(&self, caller: Address, new_owner: Address) -> Result<()>;

    /// Owner-only. `token` must resolve to a token endpoint and differ from
    /// the current setting. Lotteries with purchases keep settling in the
    /// token they were paid in.
    fn set_payment_token(&self, caller: Address, token: Address) -> Result<()>;
}

impl AdminAuthority for LotteryEngine {
    fn owner(&self) -> Result<Address> {
        Ok(self.admin_config()?.owner)
    }

    fn payment_token(&self) -> Result<Option<Address>> {
        Ok(self.admin_config()?.payment_token)
    }

    fn set_owner(&self, caller: Address, new_owner: Address) -> Result<()> {
        let _op = self.enter("set_owner")?;
        let mut config = self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(LotteryError::validation("owner cannot be the zero address"));
        }

        let old = config.owner;
        config.owner = new_owner;

        let mut tx = self.store().begin()?;
        tx.put_config(&config)?;
        tx.append_event(self.now(), &LotteryEvent::OwnerUpdated { old, new: new_owner })?;
        tx.commit()?;

        tracing::info!("Ownership moved from {} to {}", old, new_owner);
        Ok(())
    }

    fn set_payment_token(&self, caller: Address, token: Address) -> Result<()> {
        let _op = self.enter("set_payment_token")?;
        let mut config = self.require_owner(caller)?;

        if token.is_zero() {
            return Err(LotteryError::validation("payment token cannot be the zero address"));
        }
        if config.payment_token == Some(token) {
            return Err(LotteryError::conflict(format!(
                "{token} is already the payment token"
            )));
        }
        let Some(endpoint) = self.tokens().resolve(token) else {
            return Err(LotteryError::validation(format!(
                "address is not a token contract: {token}"
            )));
        };

        let old = config.payment_token.unwrap_or(Address::ZERO);
        config.payment_token = Some(token);

        let mut tx = self.store().begin()?;
        tx.put_config(&config)?;
        tx.append_event(self.now(), &LotteryEvent::PaymentTokenUpdated { old, new: token })?;
        tx.commit()?;

        tracing::info!("Payment token set to {} ({})", endpoint.symbol(), token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use sealdraw_core::{
        EngineSettings, FungibleToken, LedgerToken, ManualClock, TokenRegistry,
    };
    use std::sync::Arc;

    fn setup() -> (LotteryEngine, Address, Arc<LedgerToken>) {
        let owner = Address::from_label("owner");
        let token = Arc::new(LedgerToken::new("TKN"));
        let registry = Arc::new(TokenRegistry::new());
        registry.register(token.clone());

        let engine = LotteryEngine::new(
            Arc::new(MemoryStore::new()),
            registry,
            Arc::new(ManualClock::new(0)),
            EngineSettings::default(),
            owner,
        )
        .unwrap();
        (engine, owner, token)
    }

    #[test]
    fn test_set_payment_token() {
        let (engine, owner, token) = setup();
        assert_eq!(engine.payment_token().unwrap(), None);

        engine.set_payment_token(owner, token.address()).unwrap();
        assert_eq!(engine.payment_token().unwrap(), Some(token.address()));

        let events = engine.events_since(0).unwrap();
        assert_eq!(
            events[0].event,
            LotteryEvent::PaymentTokenUpdated {
                old: Address::ZERO,
                new: token.address()
            }
        );

        let same = engine.set_payment_token(owner, token.address()).unwrap_err();
        assert_eq!(same.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_set_payment_token_rejections() {
        let (engine, owner, token) = setup();

        let cases = [
            (engine.set_payment_token(owner, Address::ZERO), ErrorKind::Validation),
            (
                engine.set_payment_token(owner, Address::from_label("wallet")),
                ErrorKind::Validation,
            ),
            (
                engine.set_payment_token(Address::from_label("mallory"), token.address()),
                ErrorKind::Authorization,
            ),
        ];
        for (result, kind) in cases {
            assert_eq!(result.unwrap_err().kind(), kind);
        }
        assert!(engine.events_since(0).unwrap().is_empty());
    }

    #[test]
    fn test_ownership_transfer() {
        let (engine, owner, _) = setup();
        let next = Address::from_label("next");

        assert_eq!(
            engine.set_owner(owner, Address::ZERO).unwrap_err().kind(),
            ErrorKind::Validation
        );
        engine.set_owner(owner, next).unwrap();
        assert_eq!(engine.owner().unwrap(), next);

        // the previous owner lost its rights
        assert_eq!(
            engine.set_owner(owner, owner).unwrap_err().kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            engine.events_since(0).unwrap()[0].event,
            LotteryEvent::OwnerUpdated { old: owner, new: next }
        );
    }
}
