use runeclash_engine::errors::EngineError;
use thiserror::Error;

use crate::wagering::BetStatus;

/// Service-level error taxonomy. Every variant is recoverable at the call
/// boundary and returned as a typed result; no operation partially applies
/// its effects on failure.
#[derive(Debug, Error, PartialEq)]
pub enum ArenaError {
    #[error("match not found: {0}")]
    MatchNotFound(String),
    #[error("wager not found for match {0}")]
    WagerNotFound(String),
    #[error("bet transaction not found: {0}")]
    BetTransactionNotFound(String),
    #[error("transaction {0} does not belong to this wager")]
    TransactionNotInWager(String),
    #[error("bet transaction {id} already resolved as {status:?}")]
    InvalidTransactionState { id: String, status: BetStatus },
    #[error("players cannot act on their own bet")]
    SelfActionNotAllowed,
    #[error("invalid signature for player {0}")]
    InvalidSignature(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("player {0} is not part of this match")]
    UnknownPlayer(String),
    #[error("player not found: {0}")]
    PlayerNotFound(String),
    #[error("insufficient {currency} balance: have {available}, need {required}")]
    InsufficientBalance {
        currency: &'static str,
        available: f64,
        required: f64,
    },
    #[error("no reward configured for rank tier {0:?}")]
    RewardConfigMissing(String),
    #[error("bet time limit exceeded; {winner} wins by forfeit")]
    BetTimeLimitExceeded { winner: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("storage lock poisoned")]
    StoragePoisoned,
}
