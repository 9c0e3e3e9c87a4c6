use crate::commitment::Secret;
use sealdraw_core::{Address, Amount, Digest, LotteryId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Lifecycle state. `Canceled` and `Finalized` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotteryState {
    Open,
    Canceled,
    Finalized,
}

impl LotteryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Canceled => "canceled",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for LotteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque metadata reference, stored and returned unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryMetadata {
    pub hash: Digest,
    pub url: String,
}

/// Arguments of `create_lottery`.
#[derive(Debug, Clone)]
pub struct LotteryParams {
    pub end_time: Timestamp,
    pub ticket_count: u64,
    pub num_winners: u64,
    pub min_percentage: u32,
    pub ticket_price: Amount,
    pub metadata: LotteryMetadata,
}

impl LotteryParams {
    pub fn new(
        end_time: Timestamp,
        ticket_count: u64,
        num_winners: u64,
        min_percentage: u32,
        ticket_price: Amount,
    ) -> Self {
        Self {
            end_time,
            ticket_count,
            num_winners,
            min_percentage,
            ticket_price,
            metadata: LotteryMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, hash: Digest, url: impl Into<String>) -> Self {
        self.metadata = LotteryMetadata {
            hash,
            url: url.into(),
        };
        self
    }
}

/// Phase boundaries, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimes {
    pub created_at: Timestamp,
    pub purchase_ends_at: Timestamp,
    pub reveal_ends_at: Timestamp,
}

/// Where a lottery stands relative to its phase boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Purchase,
    /// Exactly at the purchase deadline: sales are closed and reveals have
    /// not opened yet.
    Sealed,
    Reveal,
    Ended,
}

impl PhaseTimes {
    /// The purchase window takes the first half of `[now, end]` (rounded
    /// down), the reveal window the rest.
    pub fn derive(now: Timestamp, end: Timestamp) -> Self {
        // midpoint lies between `now` and `end`, so it fits back in i64
        let half = (i128::from(end) - i128::from(now)) / 2;
        Self {
            created_at: now,
            purchase_ends_at: (i128::from(now) + half) as Timestamp,
            reveal_ends_at: end,
        }
    }

    pub fn phase_at(&self, now: Timestamp) -> Phase {
        if now < self.purchase_ends_at {
            Phase::Purchase
        } else if now == self.purchase_ends_at {
            Phase::Sealed
        } else if now < self.reveal_ends_at {
            Phase::Reveal
        } else {
            Phase::Ended
        }
    }
}

/// One `buy` call: a contiguous ticket range and its sealed commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub buyer: Address,
    pub start_ticket: u64,
    pub quantity: u32,
    pub commit_hash: Digest,
    pub revealed_secret: Option<Secret>,
    pub refund_withdrawn: bool,
}

impl PurchaseRecord {
    pub fn is_revealed(&self) -> bool {
        self.revealed_secret.is_some()
    }

    pub fn end_ticket(&self) -> u64 {
        self.start_ticket + u64::from(self.quantity) - 1
    }

    pub fn range(&self) -> RangeInclusive<u64> {
        self.start_ticket..=self.end_ticket()
    }

    pub fn contains(&self, ticket: u64) -> bool {
        self.range().contains(&ticket)
    }
}

/// Start and length of a purchased range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRange {
    pub start: u64,
    pub quantity: u32,
}

/// Creation parameters as reported by `lottery_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryInfo {
    pub end_time: Timestamp,
    pub ticket_count: u64,
    pub num_winners: u64,
    pub min_percentage: u32,
    pub ticket_price: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lottery {
    pub id: LotteryId,
    pub created_by: Address,
    pub times: PhaseTimes,
    pub ticket_count: u64,
    pub num_winners: u64,
    pub min_percentage: u32,
    pub ticket_price: Amount,
    pub metadata: LotteryMetadata,
    pub tickets_sold: u64,
    pub purchases: Vec<PurchaseRecord>,
    pub state: LotteryState,
    pub winning_tickets: Vec<u64>,
    pub proceeds_withdrawn: bool,
    /// Token pinned at the first purchase. `None` follows the global setting.
    #[serde(default)]
    pub payment_token: Option<Address>,
}

impl Lottery {
    pub fn new(id: LotteryId, created_by: Address, now: Timestamp, params: LotteryParams) -> Self {
        Self {
            id,
            created_by,
            times: PhaseTimes::derive(now, params.end_time),
            ticket_count: params.ticket_count,
            num_winners: params.num_winners,
            min_percentage: params.min_percentage,
            ticket_price: params.ticket_price,
            metadata: params.metadata,
            tickets_sold: 0,
            purchases: Vec::new(),
            state: LotteryState::Open,
            winning_tickets: Vec::new(),
            proceeds_withdrawn: false,
            payment_token: None,
        }
    }

    pub fn phase_at(&self, now: Timestamp) -> Phase {
        self.times.phase_at(now)
    }

    pub fn remaining_tickets(&self) -> u64 {
        self.ticket_count.saturating_sub(self.tickets_sold)
    }

    /// Appends a record right after the last sold ticket and returns its
    /// first ticket number. Capacity is checked by the caller.
    pub fn record_purchase(&mut self, buyer: Address, quantity: u32, commit_hash: Digest) -> u64 {
        let start_ticket = self.tickets_sold + 1;
        self.purchases.push(PurchaseRecord {
            buyer,
            start_ticket,
            quantity,
            commit_hash,
            revealed_secret: None,
            refund_withdrawn: false,
        });
        self.tickets_sold += u64::from(quantity);
        start_ticket
    }

    /// Position of the record that starts at `start_ticket`.
    pub fn purchase_index(&self, start_ticket: u64) -> Option<usize> {
        self.purchases
            .binary_search_by_key(&start_ticket, |record| record.start_ticket)
            .ok()
    }

    /// Record whose range holds `ticket`.
    pub fn record_covering(&self, ticket: u64) -> Option<&PurchaseRecord> {
        if ticket == 0 || ticket > self.tickets_sold {
            return None;
        }
        let after = self
            .purchases
            .partition_point(|record| record.start_ticket <= ticket);
        self.purchases
            .get(after.checked_sub(1)?)
            .filter(|record| record.contains(ticket))
    }

    pub fn records_of(&self, buyer: Address) -> impl Iterator<Item = &PurchaseRecord> {
        self.purchases.iter().filter(move |r| r.buyer == buyer)
    }

    /// `tickets_sold * 100 >= ticket_count * min_percentage`, without
    /// overflow.
    pub fn threshold_met(&self) -> bool {
        u128::from(self.tickets_sold) * 100
            >= u128::from(self.ticket_count) * u128::from(self.min_percentage)
    }

    /// Total paid in for all sold tickets.
    pub fn collected(&self) -> Option<Amount> {
        self.ticket_price.checked_mul(self.tickets_sold)
    }

    pub fn info(&self) -> LotteryInfo {
        LotteryInfo {
            end_time: self.times.reveal_ends_at,
            ticket_count: self.ticket_count,
            num_winners: self.num_winners,
            min_percentage: self.min_percentage,
            ticket_price: self.ticket_price,
        }
    }
}

/// Global configuration held by the admin authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    pub owner: Address,
    pub payment_token: Option<Address>,
}

/// Funds a lottery holds in custody and what has left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowPosition {
    pub collected: Amount,
    pub proceeds_paid: Amount,
    pub refunds_paid: Amount,
}

impl EscrowPosition {
    pub fn outstanding(&self) -> Amount {
        self.collected
            .checked_sub(self.proceeds_paid)
            .and_then(|left| left.checked_sub(self.refunds_paid))
            .unwrap_or(Amount::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lottery() -> Lottery {
        let params = LotteryParams::new(3_600, 32, 5, 20, Amount::new(10));
        Lottery::new(1, Address::from_label("owner"), 0, params)
    }

    #[test]
    fn test_phase_times_split_window() {
        let times = PhaseTimes::derive(100, 201);
        assert_eq!(times.purchase_ends_at, 150);
        assert_eq!(times.reveal_ends_at, 201);

        assert_eq!(times.phase_at(149), Phase::Purchase);
        assert_eq!(times.phase_at(150), Phase::Sealed);
        assert_eq!(times.phase_at(151), Phase::Reveal);
        assert_eq!(times.phase_at(200), Phase::Reveal);
        assert_eq!(times.phase_at(201), Phase::Ended);
    }

    #[test]
    fn test_phase_times_span_the_whole_clock() {
        let times = PhaseTimes::derive(i64::MIN, i64::MAX);
        assert_eq!(times.purchase_ends_at, -1);
        assert_eq!(times.phase_at(0), Phase::Reveal);
    }

    #[test]
    fn test_ranges_are_contiguous() {
        let mut lottery = lottery();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        assert_eq!(lottery.record_purchase(alice, 5, Digest::new([1; 32])), 1);
        assert_eq!(lottery.record_purchase(bob, 3, Digest::new([2; 32])), 6);
        assert_eq!(lottery.record_purchase(alice, 1, Digest::new([3; 32])), 9);
        assert_eq!(lottery.tickets_sold, 9);
        assert_eq!(lottery.remaining_tickets(), 23);

        assert_eq!(lottery.purchase_index(6), Some(1));
        assert_eq!(lottery.purchase_index(7), None);

        assert_eq!(lottery.record_covering(5).unwrap().buyer, alice);
        assert_eq!(lottery.record_covering(6).unwrap().buyer, bob);
        assert_eq!(lottery.record_covering(8).unwrap().start_ticket, 6);
        assert_eq!(lottery.record_covering(9).unwrap().start_ticket, 9);
        assert!(lottery.record_covering(0).is_none());
        assert!(lottery.record_covering(10).is_none());
        assert_eq!(lottery.records_of(alice).count(), 2);
    }

    #[test]
    fn test_threshold_boundaries() {
        let mut lottery = lottery();
        let buyer = Address::from_label("alice");

        lottery.record_purchase(buyer, 6, Digest::new([1; 32]));
        // 6 of 32 is 18.75%
        assert!(!lottery.threshold_met());

        lottery.record_purchase(buyer, 1, Digest::new([1; 32]));
        assert!(lottery.threshold_met());
        assert_eq!(lottery.collected(), Some(Amount::new(70)));
    }

    #[test]
    fn test_threshold_does_not_overflow() {
        let params = LotteryParams::new(10, u64::MAX, 1, 100, Amount::new(1));
        let mut lottery = Lottery::new(1, Address::ZERO, 0, params);
        lottery.tickets_sold = u64::MAX;
        assert!(lottery.threshold_met());
    }

    #[test]
    fn test_escrow_outstanding() {
        let position = EscrowPosition {
            collected: Amount::new(100),
            proceeds_paid: Amount::ZERO,
            refunds_paid: Amount::new(30),
        };
        assert_eq!(position.outstanding(), Amount::new(70));
    }
}
