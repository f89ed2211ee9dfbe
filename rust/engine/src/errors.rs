use thiserror::Error;

use crate::cards::CardId;
use crate::state::MatchStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("match is not accepting play")]
    MatchNotActive,
    #[error("card verification failed for player {player}")]
    CardVerificationFailed { player: String },
    #[error("no commitment recorded for player {player} in round {round}")]
    CommitmentMissing { player: String, round: u32 },
    #[error("commitment already recorded for player {player} in round {round}")]
    CommitmentAlreadySet { player: String, round: u32 },
    #[error("cards already revealed by player {player} in round {round}")]
    AlreadyRevealed { player: String, round: u32 },
    #[error("player {player} is not part of this match")]
    UnknownPlayer { player: String },
    #[error("unknown card id {0}")]
    UnknownCard(CardId),
    #[error(
        "player {player}'s card at position {position} does not match the \
         surviving card from the previous round"
    )]
    CardMismatch { player: String, position: usize },
    #[error("player {player} played {required} energy with only {available} available")]
    EnergyExceeded {
        player: String,
        required: i32,
        available: i32,
    },
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },
    #[error("both players have not revealed for round {round}")]
    RoundNotReady { round: u32 },
}
