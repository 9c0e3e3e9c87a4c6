use crate::engine::LotteryEngine;
use crate::events::LotteryEvent;
use crate::model::{EscrowPosition, Lottery, LotteryState};
use crate::{LotteryError, Result};
use sealdraw_core::{Address, Amount, CoreError, LotteryId};

/// Payouts from custody once a lottery is settled.
pub trait Escrow {
    /// Owner-only, once per lottery. Pays the full sale amount of a
    /// finalized lottery to the owner. A canceled lottery pays nothing but
    /// still records the withdrawal.
    fn withdraw_ticket_proceeds(&self, caller: Address, id: LotteryId) -> Result<Amount>;

    /// Refunds the purchase starting at `start_ticket` of a canceled
    /// lottery to its buyer, once.
    fn withdraw_ticket_refund(
        &self,
        caller: Address,
        id: LotteryId,
        start_ticket: u64,
    ) -> Result<Amount>;

    fn escrow_position(&self, id: LotteryId) -> Result<EscrowPosition>;
}

fn collected(lottery: &Lottery) -> Result<Amount> {
    lottery.collected().ok_or_else(|| {
        LotteryError::Core(CoreError::overflow(format!(
            "sales total of lottery {}",
            lottery.id
        )))
    })
}

fn record_refund(lottery: &Lottery, quantity: u32) -> Result<Amount> {
    lottery
        .ticket_price
        .checked_mul(u64::from(quantity))
        .ok_or_else(|| LotteryError::Core(CoreError::overflow("refund amount")))
}

impl Escrow for LotteryEngine {
    fn withdraw_ticket_proceeds(&self, caller: Address, id: LotteryId) -> Result<Amount> {
        let _op = self.enter("withdraw_ticket_proceeds")?;
        self.require_owner(caller)?;
        let lottery = self.load_lottery(id)?;
        let now = self.now();

        let amount = match lottery.state {
            LotteryState::Open => return Err(LotteryError::phase("lottery is still open")),
            LotteryState::Finalized => collected(&lottery)?,
            LotteryState::Canceled => Amount::ZERO,
        };
        if lottery.proceeds_withdrawn {
            return Err(LotteryError::conflict("proceeds already withdrawn"));
        }

        let mut claimed = lottery.clone();
        claimed.proceeds_withdrawn = true;
        self.pay_out(
            &claimed,
            &lottery,
            caller,
            amount,
            now,
            &LotteryEvent::ProceedsWithdrawn {
                lottery_id: id,
                amount,
                owner: caller,
            },
        )?;

        tracing::info!("Lottery {}: proceeds of {} withdrawn by {}", id, amount, caller);
        Ok(amount)
    }

    fn withdraw_ticket_refund(
        &self,
        caller: Address,
        id: LotteryId,
        start_ticket: u64,
    ) -> Result<Amount> {
        let _op = self.enter("withdraw_ticket_refund")?;
        let lottery = self.load_lottery(id)?;
        let now = self.now();

        match lottery.state {
            LotteryState::Open => return Err(LotteryError::phase("lottery is still open")),
            LotteryState::Finalized => {
                return Err(LotteryError::conflict(
                    "lottery was finalized, refunds are not available",
                ))
            }
            LotteryState::Canceled => {}
        }

        let index = lottery.purchase_index(start_ticket).ok_or_else(|| {
            LotteryError::not_found(format!("no purchase starting at ticket {start_ticket}"))
        })?;
        let record = &lottery.purchases[index];
        if record.buyer != caller {
            return Err(LotteryError::unauthorized(format!(
                "tickets starting at {start_ticket} belong to another buyer"
            )));
        }
        if record.refund_withdrawn {
            return Err(LotteryError::conflict(format!(
                "refund for tickets starting at {start_ticket} already withdrawn"
            )));
        }

        let amount = record_refund(&lottery, record.quantity)?;
        let mut claimed = lottery.clone();
        claimed.purchases[index].refund_withdrawn = true;
        self.pay_out(
            &claimed,
            &lottery,
            caller,
            amount,
            now,
            &LotteryEvent::TicketRefundWithdrawn {
                lottery_id: id,
                start_ticket,
                buyer: caller,
                amount,
            },
        )?;

        tracing::info!(
            "Lottery {}: refunded {} to {} for tickets {}",
            id,
            amount,
            caller,
            start_ticket
        );
        Ok(amount)
    }

    fn escrow_position(&self, id: LotteryId) -> Result<EscrowPosition> {
        let lottery = self.load_lottery(id)?;
        let collected = collected(&lottery)?;

        let proceeds_paid = if lottery.proceeds_withdrawn && lottery.state == LotteryState::Finalized
        {
            collected
        } else {
            Amount::ZERO
        };

        let mut refunds_paid = Amount::ZERO;
        for record in lottery.purchases.iter().filter(|r| r.refund_withdrawn) {
            refunds_paid = refunds_paid
                .checked_add(record_refund(&lottery, record.quantity)?)
                .ok_or_else(|| LotteryError::Core(CoreError::overflow("refund total")))?;
        }

        Ok(EscrowPosition {
            collected,
            proceeds_paid,
            refunds_paid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{commit, Secret};
    use crate::error::ErrorKind;
    use crate::model::LotteryParams;
    use crate::store::MemoryStore;
    use crate::{AdminAuthority, LotteryRegistry, TicketSales, WinnerSelection};
    use sealdraw_core::{
        EngineSettings, FungibleToken, LedgerToken, ManualClock, TokenRegistry,
    };
    use std::sync::Arc;

    const START: i64 = 500;

    struct Fixture {
        engine: LotteryEngine,
        clock: Arc<ManualClock>,
        token: Arc<LedgerToken>,
        owner: Address,
        alice: Address,
    }

    /// One lottery of 10 tickets at 4 each, 50% to finalize.
    fn setup() -> Fixture {
        let owner = Address::from_label("owner");
        let alice = Address::from_label("alice");
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
            .create_lottery(owner, LotteryParams::new(START + 20, 10, 2, 50, Amount::new(4)))
            .unwrap();

        token.mint(alice, Amount::new(100)).unwrap();
        token.approve(alice, engine.custody(), Amount::new(100));

        Fixture {
            engine,
            clock,
            token,
            owner,
            alice,
        }
    }

    #[test]
    fn test_nothing_withdrawable_while_open() {
        let f = setup();
        f.engine
            .buy_tickets(f.alice, 1, 3, commit(&Secret::from(1u64)))
            .unwrap();

        assert_eq!(
            f.engine.withdraw_ticket_proceeds(f.owner, 1).unwrap_err().kind(),
            ErrorKind::Phase
        );
        assert_eq!(
            f.engine.withdraw_ticket_refund(f.alice, 1, 1).unwrap_err().kind(),
            ErrorKind::Phase
        );
    }

    #[test]
    fn test_canceled_lottery_pays_zero_proceeds_and_refunds() {
        let f = setup();
        f.engine
            .buy_tickets(f.alice, 1, 3, commit(&Secret::from(1u64)))
            .unwrap();
        f.clock.set(START + 20);
        assert_eq!(
            f.engine.finalize_lottery(f.owner, 1).unwrap(),
            LotteryState::Canceled
        );

        assert_eq!(
            f.engine.withdraw_ticket_proceeds(f.alice, 1).unwrap_err().kind(),
            ErrorKind::Authorization
        );
        assert_eq!(f.engine.withdraw_ticket_proceeds(f.owner, 1).unwrap(), Amount::ZERO);
        assert_eq!(
            f.engine.withdraw_ticket_proceeds(f.owner, 1).unwrap_err().kind(),
            ErrorKind::StateConflict
        );

        assert_eq!(
            f.engine.withdraw_ticket_refund(f.owner, 1, 1).unwrap_err().kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            f.engine.withdraw_ticket_refund(f.alice, 1, 2).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(f.engine.withdraw_ticket_refund(f.alice, 1, 1).unwrap(), Amount::new(12));
        assert_eq!(f.token.balance_of(f.alice), Amount::new(100));

        let position = f.engine.escrow_position(1).unwrap();
        assert_eq!(position.collected, Amount::new(12));
        assert_eq!(position.refunds_paid, Amount::new(12));
        assert_eq!(position.outstanding(), Amount::ZERO);
    }

    #[test]
    fn test_finalized_lottery_has_no_refunds() {
        let f = setup();
        f.engine
            .buy_tickets(f.alice, 1, 5, commit(&Secret::from(1u64)))
            .unwrap();
        f.clock.set(START + 20);
        assert_eq!(
            f.engine.finalize_lottery(f.alice, 1).unwrap(),
            LotteryState::Finalized
        );

        assert_eq!(
            f.engine.withdraw_ticket_refund(f.alice, 1, 1).unwrap_err().kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(f.engine.withdraw_ticket_proceeds(f.owner, 1).unwrap(), Amount::new(20));
        assert_eq!(f.token.balance_of(f.owner), Amount::new(20));
        assert_eq!(f.engine.escrow_position(1).unwrap().outstanding(), Amount::ZERO);
    }
}
