//! sealdraw core - shared types and the execution environment seams
//!
//! The lottery engine runs against three collaborators defined here: a
//! [`Clock`], a token directory resolving [`FungibleToken`] endpoints, and a
//! SQLite [`Storage`] for persistent state.

pub mod clock;
pub mod config;
pub mod error;
pub mod storage;
pub mod token;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineSettings;
pub use error::{CoreError, Result};
pub use storage::{Storage, StorageTransaction, TokenStore};
pub use token::{FungibleToken, LedgerToken, TokenDirectory, TokenRegistry, TokenSnapshot};
pub use types::{Address, Amount, Digest, LotteryId, Timestamp};
