use crate::commitment::{CommitmentScheme, HashCommitment, Secret};
use crate::engine::LotteryEngine;
use crate::events::LotteryEvent;
use crate::model::{Phase, PurchaseRecord, TicketRange};
use crate::{LotteryError, Result};
use sealdraw_core::{Address, Digest, LotteryId};

/// Ticket purchases and commitment reveals.
pub trait TicketSales {
    /// Buys `quantity` consecutive tickets sealed by `commit_hash` and
    /// returns the first ticket number. The price is pulled from `caller`
    /// with `transfer_from`, so the engine's custody account needs an
    /// allowance first.
    fn buy_tickets(
        &self,
        caller: Address,
        id: LotteryId,
        quantity: u32,
        commit_hash: Digest,
    ) -> Result<u64>;

    /// Opens the commitment of the purchase starting at `start_ticket`.
    fn reveal_secret(
        &self,
        caller: Address,
        id: LotteryId,
        start_ticket: u64,
        quantity: u32,
        secret: Secret,
    ) -> Result<()>;

    fn num_purchase_txs(&self, id: LotteryId) -> Result<usize>;

    /// 1-indexed, in purchase order.
    fn ith_purchased_ticket(&self, id: LotteryId, index: usize) -> Result<TicketRange>;

    fn tickets_of(&self, id: LotteryId, buyer: Address) -> Result<Vec<PurchaseRecord>>;
}

impl LotteryEngine {
    fn check_quantity(&self, quantity: u32) -> Result<()> {
        let max = self.settings().max_tickets_per_purchase;
        if quantity == 0 || quantity > max {
            return Err(LotteryError::validation(format!(
                "quantity must be between 1 and {max}"
            )));
        }
        Ok(())
    }
}

impl TicketSales for LotteryEngine {
    fn buy_tickets(
        &self,
        caller: Address,
        id: LotteryId,
        quantity: u32,
        commit_hash: Digest,
    ) -> Result<u64> {
        let _op = self.enter("buy_tickets")?;
        let mut lottery = self.load_lottery(id)?;
        let now = self.now();

        if lottery.phase_at(now) != Phase::Purchase {
            return Err(LotteryError::phase("purchase phase has ended"));
        }
        self.check_quantity(quantity)?;
        if commit_hash.is_zero() {
            return Err(LotteryError::validation("commit hash cannot be zero"));
        }
        if u64::from(quantity) > lottery.remaining_tickets() {
            return Err(LotteryError::validation(format!(
                "not enough tickets remaining ({} left)",
                lottery.remaining_tickets()
            )));
        }

        let cost = lottery
            .ticket_price
            .checked_mul(u64::from(quantity))
            .ok_or_else(|| LotteryError::validation("purchase cost overflows"))?;
        let token = self.settlement_token(&lottery)?;
        if lottery.payment_token.is_none() {
            lottery.payment_token = Some(token.address());
        }

        let start_ticket = lottery.record_purchase(caller, quantity, commit_hash);

        let mut tx = self.store().begin()?;
        tx.put_lottery(&lottery)?;
        tx.append_event(
            now,
            &LotteryEvent::TicketPurchased {
                lottery_id: id,
                buyer: caller,
                start_ticket,
                quantity,
            },
        )?;

        if !token.transfer_from(self.custody(), caller, self.custody(), cost) {
            tracing::warn!(
                "Lottery {}: payment of {} {} from {} was refused",
                id,
                cost,
                token.symbol(),
                caller
            );
            return Err(LotteryError::transfer(format!(
                "could not collect {cost} {} from {caller}",
                token.symbol()
            )));
        }
        self.commit_after_pull(tx, token.as_ref(), caller, cost)?;

        tracing::info!(
            "Lottery {}: {} bought tickets {}..={} for {}",
            id,
            caller,
            start_ticket,
            start_ticket + u64::from(quantity) - 1,
            cost
        );
        Ok(start_ticket)
    }

    fn reveal_secret(
        &self,
        caller: Address,
        id: LotteryId,
        start_ticket: u64,
        quantity: u32,
        secret: Secret,
    ) -> Result<()> {
        let _op = self.enter("reveal_secret")?;
        let mut lottery = self.load_lottery(id)?;
        let now = self.now();

        match lottery.phase_at(now) {
            Phase::Purchase | Phase::Sealed => {
                return Err(LotteryError::phase("reveal phase has not started yet"))
            }
            Phase::Ended => return Err(LotteryError::phase("reveal phase has ended")),
            Phase::Reveal => {}
        }
        self.check_quantity(quantity)?;

        let index = lottery
            .purchase_index(start_ticket)
            .filter(|&i| lottery.purchases[i].quantity == quantity)
            .ok_or_else(|| {
                LotteryError::not_found(format!(
                    "no purchase of {quantity} tickets starting at {start_ticket}"
                ))
            })?;

        let record = &mut lottery.purchases[index];
        if record.buyer != caller {
            return Err(LotteryError::unauthorized(format!(
                "tickets starting at {start_ticket} belong to another buyer"
            )));
        }
        if record.is_revealed() {
            return Err(LotteryError::conflict(format!(
                "tickets starting at {start_ticket} are already revealed"
            )));
        }
        if !HashCommitment::verify(&record.commit_hash, &secret) {
            tracing::warn!(
                "Lottery {}: reveal by {} does not match commitment of tickets {}",
                id,
                caller,
                start_ticket
            );
            return Err(LotteryError::CommitmentMismatch);
        }
        record.revealed_secret = Some(secret);

        let mut tx = self.store().begin()?;
        tx.put_lottery(&lottery)?;
        tx.append_event(
            now,
            &LotteryEvent::RandomNumberRevealed {
                lottery_id: id,
                start_ticket,
            },
        )?;
        tx.commit()?;

        tracing::info!("Lottery {}: {} revealed tickets {}", id, caller, start_ticket);
        Ok(())
    }

    fn num_purchase_txs(&self, id: LotteryId) -> Result<usize> {
        Ok(self.load_lottery(id)?.purchases.len())
    }

    fn ith_purchased_ticket(&self, id: LotteryId, index: usize) -> Result<TicketRange> {
        let lottery = self.load_lottery(id)?;
        let len = lottery.purchases.len();
        index
            .checked_sub(1)
            .and_then(|i| lottery.purchases.get(i))
            .map(|record| TicketRange {
                start: record.start_ticket,
                quantity: record.quantity,
            })
            .ok_or(LotteryError::IndexOutOfBounds { index, len })
    }

    fn tickets_of(&self, id: LotteryId, buyer: Address) -> Result<Vec<PurchaseRecord>> {
        let lottery = self.load_lottery(id)?;
        Ok(lottery.records_of(buyer).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::commit;
    use crate::error::ErrorKind;
    use crate::model::LotteryParams;
    use crate::store::MemoryStore;
    use crate::{AdminAuthority, LotteryRegistry};
    use sealdraw_core::{
        Amount, EngineSettings, FungibleToken, LedgerToken, ManualClock, TokenRegistry,
    };
    use std::sync::Arc;

    const START: i64 = 10_000;

    struct Fixture {
        engine: LotteryEngine,
        clock: Arc<ManualClock>,
        token: Arc<LedgerToken>,
        alice: Address,
        bob: Address,
    }

    fn setup() -> Fixture {
        let owner = Address::from_label("owner");
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let clock = Arc::new(ManualClock::new(START));
        let token = Arc::new(LedgerToken::new("TKN"));
        let registry = Arc::new(TokenRegistry::new());
        registry.register(token.clone());

        let engine = LotteryEngine::new(
            Arc::new(MemoryStore::new()),
            registry,
            clock.clone(),
            EngineSettings::default(),
            owner,
        )
        .unwrap();
        engine.set_payment_token(owner, token.address()).unwrap();
        engine
            .create_lottery(owner, LotteryParams::new(START + 100, 32, 5, 20, Amount::new(10)))
            .unwrap();

        for buyer in [alice, bob] {
            token.mint(buyer, Amount::new(1_000)).unwrap();
            token.approve(buyer, engine.custody(), Amount::new(1_000));
        }

        Fixture {
            engine,
            clock,
            token,
            alice,
            bob,
        }
    }

    #[test]
    fn test_buy_allocates_consecutive_ranges() {
        let f = setup();
        let secret = Secret::from(42u64);

        assert_eq!(f.engine.buy_tickets(f.alice, 1, 5, commit(&secret)).unwrap(), 1);
        assert_eq!(f.engine.buy_tickets(f.bob, 1, 3, commit(&secret)).unwrap(), 6);
        assert_eq!(f.engine.buy_tickets(f.alice, 1, 2, commit(&secret)).unwrap(), 9);

        assert_eq!(f.engine.lottery_sales(1).unwrap(), 10);
        assert_eq!(f.engine.num_purchase_txs(1).unwrap(), 3);
        assert_eq!(
            f.engine.ith_purchased_ticket(1, 2).unwrap(),
            TicketRange {
                start: 6,
                quantity: 3
            }
        );
        assert_eq!(f.engine.tickets_of(1, f.alice).unwrap().len(), 2);

        assert_eq!(f.token.balance_of(f.alice), Amount::new(930));
        assert_eq!(f.token.balance_of(f.engine.custody()), Amount::new(100));
        assert_eq!(
            f.engine.lottery_payment_token(1).unwrap(),
            Some(f.token.address())
        );
    }

    #[test]
    fn test_buy_rejections() {
        let f = setup();
        let hash = commit(&Secret::from(1u64));

        let cases = [
            (f.engine.buy_tickets(f.alice, 1, 0, hash), ErrorKind::Validation),
            (f.engine.buy_tickets(f.alice, 1, 31, hash), ErrorKind::Validation),
            (f.engine.buy_tickets(f.alice, 1, 1, Digest::ZERO), ErrorKind::Validation),
            (f.engine.buy_tickets(f.alice, 2, 1, hash), ErrorKind::NotFound),
        ];
        for (result, kind) in cases {
            assert_eq!(result.unwrap_err().kind(), kind);
        }

        f.engine.buy_tickets(f.alice, 1, 30, hash).unwrap();
        let err = f.engine.buy_tickets(f.bob, 1, 3, hash).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(f.engine.buy_tickets(f.bob, 1, 2, hash).unwrap(), 31);

        f.clock.set(START + 50);
        let err = f.engine.buy_tickets(f.bob, 1, 1, hash).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Phase);
    }

    #[test]
    fn test_buy_without_allowance_changes_nothing() {
        let f = setup();
        let carol = Address::from_label("carol");
        f.token.mint(carol, Amount::new(1_000)).unwrap();

        let err = f
            .engine
            .buy_tickets(carol, 1, 1, commit(&Secret::from(1u64)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert_eq!(f.engine.lottery_sales(1).unwrap(), 0);
        assert_eq!(f.engine.lottery_payment_token(1).unwrap(), Some(f.token.address()));
        assert_eq!(f.engine.lottery(1).unwrap().payment_token, None);
        // only the setup events
        assert_eq!(f.engine.events_since(0).unwrap().len(), 2);
    }

    #[test]
    fn test_reveal_window_and_checks() {
        let f = setup();
        let secret = Secret::from(7u64);
        f.engine.buy_tickets(f.alice, 1, 5, commit(&secret)).unwrap();

        let err = f.engine.reveal_secret(f.alice, 1, 1, 5, secret).unwrap_err();
        assert!(matches!(err, LotteryError::Phase(ref m) if m.contains("not started")));

        // purchase_ends_at itself is not yet inside the reveal window
        f.clock.set(START + 50);
        assert_eq!(
            f.engine.reveal_secret(f.alice, 1, 1, 5, secret).unwrap_err().kind(),
            ErrorKind::Phase
        );

        f.clock.set(START + 51);
        assert_eq!(
            f.engine.reveal_secret(f.alice, 1, 1, 4, secret).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            f.engine.reveal_secret(f.bob, 1, 1, 5, secret).unwrap_err().kind(),
            ErrorKind::Authorization
        );
        assert!(matches!(
            f.engine.reveal_secret(f.alice, 1, 1, 5, Secret::from(8u64)),
            Err(LotteryError::CommitmentMismatch)
        ));
        assert!(!f.engine.tickets_of(1, f.alice).unwrap()[0].is_revealed());

        f.engine.reveal_secret(f.alice, 1, 1, 5, secret).unwrap();
        assert!(f.engine.tickets_of(1, f.alice).unwrap()[0].is_revealed());
        assert_eq!(
            f.engine.reveal_secret(f.alice, 1, 1, 5, secret).unwrap_err().kind(),
            ErrorKind::StateConflict
        );

        f.clock.set(START + 100);
        let err = f.engine.reveal_secret(f.alice, 1, 1, 5, secret).unwrap_err();
        assert!(matches!(err, LotteryError::Phase(ref m) if m.contains("ended")));
    }

    #[test]
    fn test_ith_purchase_bounds() {
        let f = setup();
        f.engine
            .buy_tickets(f.alice, 1, 1, commit(&Secret::from(1u64)))
            .unwrap();

        assert!(matches!(
            f.engine.ith_purchased_ticket(1, 0),
            Err(LotteryError::IndexOutOfBounds { index: 0, len: 1 })
        ));
        assert_eq!(
            f.engine.ith_purchased_ticket(1, 2).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
