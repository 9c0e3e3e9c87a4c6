use sealdraw_core::{CoreError, LotteryId};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

/// Failure classes a client acts on: fix the input, wait for the right
/// phase, switch identity, or treat the call as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    Phase,
    Authorization,
    NotFound,
    StateConflict,
    Transfer,
    Storage,
}

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("Random number does not match the committed hash")]
    CommitmentMismatch,

    #[error("Wrong phase: {0}")]
    Phase(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Lottery {0} does not exist")]
    LotteryNotFound(LotteryId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index {index} out of bounds (1..={len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl LotteryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::CommitmentMismatch => ErrorKind::Validation,
            Self::Phase(_) => ErrorKind::Phase,
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::LotteryNotFound(_) | Self::NotFound(_) | Self::IndexOutOfBounds { .. } => {
                ErrorKind::NotFound
            }
            Self::StateConflict(_) => ErrorKind::StateConflict,
            Self::Transfer(_) => ErrorKind::Transfer,
            Self::Core(CoreError::Config(_))
            | Self::Core(CoreError::InvalidAddress(_))
            | Self::Core(CoreError::InvalidDigest(_))
            | Self::Core(CoreError::Overflow(_)) => ErrorKind::Validation,
            Self::Core(_) | Self::Serialization(_) | Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn phase(msg: impl Into<String>) -> Self {
        Self::Phase(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }

    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }
}
