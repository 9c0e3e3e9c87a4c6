use sealdraw_core::{Address, Amount, LotteryId, Timestamp};
use serde::{Deserialize, Serialize};

/// Observable state changes, appended to the log in the same transaction
/// as the change itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LotteryEvent {
    LotteryCreated {
        lottery_id: LotteryId,
    },
    TicketPurchased {
        lottery_id: LotteryId,
        buyer: Address,
        start_ticket: u64,
        quantity: u32,
    },
    RandomNumberRevealed {
        lottery_id: LotteryId,
        start_ticket: u64,
    },
    LotteryFinalized {
        lottery_id: LotteryId,
        winning_tickets: Vec<u64>,
    },
    LotteryCanceled {
        lottery_id: LotteryId,
    },
    ProceedsWithdrawn {
        lottery_id: LotteryId,
        amount: Amount,
        owner: Address,
    },
    TicketRefundWithdrawn {
        lottery_id: LotteryId,
        start_ticket: u64,
        buyer: Address,
        amount: Amount,
    },
    PaymentTokenUpdated {
        old: Address,
        new: Address,
    },
    OwnerUpdated {
        old: Address,
        new: Address,
    },
}

impl LotteryEvent {
    /// Lottery the event belongs to, `None` for global configuration.
    pub fn lottery_id(&self) -> Option<LotteryId> {
        match self {
            Self::LotteryCreated { lottery_id }
            | Self::TicketPurchased { lottery_id, .. }
            | Self::RandomNumberRevealed { lottery_id, .. }
            | Self::LotteryFinalized { lottery_id, .. }
            | Self::LotteryCanceled { lottery_id }
            | Self::ProceedsWithdrawn { lottery_id, .. }
            | Self::TicketRefundWithdrawn { lottery_id, .. } => Some(*lottery_id),
            Self::PaymentTokenUpdated { .. } | Self::OwnerUpdated { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::LotteryCreated { .. } => "LotteryCreated",
            Self::TicketPurchased { .. } => "TicketPurchased",
            Self::RandomNumberRevealed { .. } => "RandomNumberRevealed",
            Self::LotteryFinalized { .. } => "LotteryFinalized",
            Self::LotteryCanceled { .. } => "LotteryCanceled",
            Self::ProceedsWithdrawn { .. } => "ProceedsWithdrawn",
            Self::TicketRefundWithdrawn { .. } => "TicketRefundWithdrawn",
            Self::PaymentTokenUpdated { .. } => "PaymentTokenUpdated",
            Self::OwnerUpdated { .. } => "OwnerUpdated",
        }
    }
}

/// Entry of the append-only event log. `seq` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub at: Timestamp,
    pub event: LotteryEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = LotteryEvent::LotteryFinalized {
            lottery_id: 3,
            winning_tickets: vec![4, 1],
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "LotteryFinalized");
        assert_eq!(json["winning_tickets"][0], 4);
        assert_eq!(event.kind(), "LotteryFinalized");
        assert_eq!(event.lottery_id(), Some(3));

        let update = LotteryEvent::OwnerUpdated {
            old: Address::ZERO,
            new: Address::from_label("owner"),
        };
        assert_eq!(update.lottery_id(), None);
    }
}
