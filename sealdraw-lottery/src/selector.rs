use crate::commitment::mix_seed;
use crate::engine::LotteryEngine;
use crate::events::LotteryEvent;
use crate::model::{LotteryState, Phase, PurchaseRecord};
use crate::{LotteryError, Result};
use sealdraw_core::{Address, Digest, LotteryId};
use std::collections::HashSet;

/// Settlement decision and winner queries.
pub trait WinnerSelection {
    /// Cancels or finalizes the lottery once the reveal window is over.
    /// Anyone may call it; the outcome does not depend on the caller.
    fn finalize_lottery(&self, caller: Address, id: LotteryId) -> Result<LotteryState>;

    /// 1-indexed, in draw order.
    fn ith_winning_ticket(&self, id: LotteryId, index: usize) -> Result<u64>;

    fn check_if_my_ticket_won(&self, caller: Address, id: LotteryId, ticket: u64)
        -> Result<bool>;
}

/// Folds the revealed secrets, in purchase order, into the draw seed.
pub fn selection_seed(records: &[PurchaseRecord]) -> Digest {
    records
        .iter()
        .filter_map(|record| record.revealed_secret.as_ref())
        .fold(Digest::ZERO, |seed, secret| mix_seed(&seed, secret))
}

/// Draws `min(num_winners, tickets_sold)` distinct tickets from
/// `[1, tickets_sold]`.
///
/// Each round re-hashes the seed and maps it onto a ticket, redrawing on
/// duplicates. Once `rounds_per_winner` rounds per winner are used up, a
/// duplicate moves forward (wrapping) to the next undrawn ticket instead,
/// so the draw always terminates.
pub fn draw_winners(
    seed: Digest,
    tickets_sold: u64,
    num_winners: u64,
    rounds_per_winner: u32,
) -> Vec<u64> {
    let target = num_winners.min(tickets_sold);
    let mut winners = Vec::with_capacity(target as usize);
    let mut drawn = HashSet::with_capacity(target as usize);
    let budget = target.saturating_mul(u64::from(rounds_per_winner));

    let mut seed = seed;
    let mut rounds = 0u64;
    while (winners.len() as u64) < target {
        seed = Digest::sha256(&[seed.as_bytes()]);
        rounds += 1;
        let mut candidate = seed.reduce(tickets_sold) + 1;

        if drawn.contains(&candidate) {
            if rounds <= budget {
                continue;
            }
            while drawn.contains(&candidate) {
                candidate = candidate % tickets_sold + 1;
            }
        }
        drawn.insert(candidate);
        winners.push(candidate);
    }

    tracing::debug!(
        "Drew {} of {} tickets in {} rounds",
        winners.len(),
        tickets_sold,
        rounds
    );
    winners
}

impl WinnerSelection for LotteryEngine {
    fn finalize_lottery(&self, caller: Address, id: LotteryId) -> Result<LotteryState> {
        let _op = self.enter("finalize_lottery")?;
        let mut lottery = self.load_lottery(id)?;
        let now = self.now();

        if lottery.phase_at(now) != Phase::Ended {
            return Err(LotteryError::phase("reveal phase has not ended yet"));
        }
        if lottery.state != LotteryState::Open {
            return Err(LotteryError::conflict("lottery already finalized or canceled"));
        }

        let event = if lottery.threshold_met() {
            let revealed = lottery.purchases.iter().filter(|r| r.is_revealed()).count();
            if revealed == 0 {
                tracing::warn!("Lottery {}: no secrets revealed, drawing from the zero seed", id);
            }

            let seed = selection_seed(&lottery.purchases);
            lottery.winning_tickets = draw_winners(
                seed,
                lottery.tickets_sold,
                lottery.num_winners,
                self.settings().draw_rounds_per_winner,
            );
            lottery.state = LotteryState::Finalized;
            LotteryEvent::LotteryFinalized {
                lottery_id: id,
                winning_tickets: lottery.winning_tickets.clone(),
            }
        } else {
            lottery.state = LotteryState::Canceled;
            LotteryEvent::LotteryCanceled { lottery_id: id }
        };

        let mut tx = self.store().begin()?;
        tx.put_lottery(&lottery)?;
        tx.append_event(now, &event)?;
        tx.commit()?;

        match lottery.state {
            LotteryState::Finalized => tracing::info!(
                "Lottery {} finalized by {}: {} of {} tickets sold, winners {:?}",
                id,
                caller,
                lottery.tickets_sold,
                lottery.ticket_count,
                lottery.winning_tickets
            ),
            _ => tracing::info!(
                "Lottery {} canceled by {}: {} of {} tickets sold, {}% required",
                id,
                caller,
                lottery.tickets_sold,
                lottery.ticket_count,
                lottery.min_percentage
            ),
        }
        Ok(lottery.state)
    }

    fn ith_winning_ticket(&self, id: LotteryId, index: usize) -> Result<u64> {
        let lottery = self.load_lottery(id)?;

        if lottery.phase_at(self.now()) != Phase::Ended {
            return Err(LotteryError::phase("reveal phase has not ended yet"));
        }
        match lottery.state {
            LotteryState::Open => {
                return Err(LotteryError::phase("lottery has not been finalized yet"))
            }
            LotteryState::Canceled => {
                return Err(LotteryError::conflict("lottery was canceled, there are no winners"))
            }
            LotteryState::Finalized => {}
        }

        let len = lottery.winning_tickets.len();
        index
            .checked_sub(1)
            .and_then(|i| lottery.winning_tickets.get(i))
            .copied()
            .ok_or(LotteryError::IndexOutOfBounds { index, len })
    }

    fn check_if_my_ticket_won(
        &self,
        caller: Address,
        id: LotteryId,
        ticket: u64,
    ) -> Result<bool> {
        let lottery = self.load_lottery(id)?;

        if lottery.phase_at(self.now()) != Phase::Ended {
            return Err(LotteryError::phase("reveal phase has not ended yet"));
        }
        if lottery.state == LotteryState::Open {
            return Err(LotteryError::phase("lottery has not been finalized yet"));
        }

        let record = lottery
            .record_covering(ticket)
            .ok_or_else(|| LotteryError::not_found("ticket does not exist or is unowned"))?;
        if record.buyer != caller {
            return Err(LotteryError::unauthorized(format!(
                "ticket {ticket} belongs to another buyer"
            )));
        }

        Ok(lottery.state == LotteryState::Finalized && lottery.winning_tickets.contains(&ticket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::Secret;

    fn record(start: u64, secret: Option<u64>) -> PurchaseRecord {
        PurchaseRecord {
            buyer: Address::from_label("buyer"),
            start_ticket: start,
            quantity: 1,
            commit_hash: Digest::new([1; 32]),
            revealed_secret: secret.map(Secret::from),
            refund_withdrawn: false,
        }
    }

    #[test]
    fn test_seed_skips_unrevealed_records() {
        let with_gap = [record(1, Some(3)), record(2, None), record(3, Some(4))];
        let without = [record(1, Some(3)), record(3, Some(4))];
        assert_eq!(selection_seed(&with_gap), selection_seed(&without));

        let swapped = [record(1, Some(4)), record(2, Some(3))];
        assert_ne!(selection_seed(&without), selection_seed(&swapped));
        assert_eq!(selection_seed(&[record(1, None)]), Digest::ZERO);
    }

    #[test]
    fn test_draw_is_deterministic_and_distinct() {
        let seed = Digest::sha256(&[b"seed"]);
        let winners = draw_winners(seed, 10, 5, 64);

        assert_eq!(winners, draw_winners(seed, 10, 5, 64));
        assert_eq!(winners.len(), 5);
        let unique: HashSet<_> = winners.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(winners.iter().all(|&t| (1..=10).contains(&t)));
    }

    #[test]
    fn test_draw_caps_at_tickets_sold() {
        let seed = Digest::sha256(&[b"few"]);
        let mut winners = draw_winners(seed, 3, 8, 64);
        winners.sort_unstable();
        assert_eq!(winners, vec![1, 2, 3]);

        assert!(draw_winners(seed, 0, 5, 64).is_empty());
    }

    #[test]
    fn test_draw_terminates_with_minimal_budget() {
        let seed = Digest::sha256(&[b"wrap-around"]);
        let mut winners = draw_winners(seed, 50, 50, 1);
        winners.sort_unstable();
        assert_eq!(winners, (1..=50).collect::<Vec<_>>());
    }
}
