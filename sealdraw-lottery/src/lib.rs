//! Commit-reveal lottery settlement
//!
//! Buyers purchase consecutive ticket ranges during the purchase window and
//! seal each purchase with the hash of a secret. After the window closes
//! they reveal their secrets, and once the reveal window is over the
//! lottery is either canceled (too few tickets sold, everyone can claim a
//! refund) or finalized (winners drawn, the owner collects the proceeds).
//!
//! Winners are drawn from a seed folded over the revealed secrets. The last
//! buyer to reveal can see the seed every other reveal produces and choose
//! whether to reveal at all, so the draw is only as fair as participants
//! are independent. Do not use it where that matters.

pub mod admin;
pub mod commitment;
pub mod engine;
pub mod error;
pub mod escrow;
pub mod events;
pub mod model;
pub mod registry;
pub mod sales;
pub mod selector;
pub mod store;

pub use admin::AdminAuthority;
pub use commitment::{commit, generate_secret, CommitmentScheme, HashCommitment, Secret};
pub use engine::LotteryEngine;
pub use error::{ErrorKind, LotteryError, Result};
pub use escrow::Escrow;
pub use events::{EventRecord, LotteryEvent};
pub use model::{
    AdminConfig, EscrowPosition, Lottery, LotteryInfo, LotteryMetadata, LotteryParams,
    LotteryState, Phase, PhaseTimes, PurchaseRecord, TicketRange,
};
pub use registry::LotteryRegistry;
pub use sales::TicketSales;
pub use selector::{draw_winners, selection_seed, WinnerSelection};
pub use store::{MemoryStore, SqliteStore, StateStore, StoreTransaction};
