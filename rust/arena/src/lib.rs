//! # runeclash-arena: Match Service Layer
//!
//! Stateful service around the deterministic `runeclash-engine` core:
//! concurrency-safe match orchestration, the wagering ladder with its
//! inactivity clock, the two-currency economy ledger, and match settlement.
//!
//! Matches live behind per-match locks inside [`manager::MatchManager`];
//! the ledger guards each account with its own mutex so balance mutation is
//! race-safe. Transport, matchmaking, and identity verification are
//! upstream collaborators reached through trait seams.

pub mod errors;
pub mod ledger;
pub mod logging;
pub mod manager;
pub mod resolution;
pub mod rewards;
pub mod signature;
pub mod wagering;

pub use errors::ArenaError;
pub use ledger::{BalanceEntry, Currency, Ledger, PlayerAccount, STARTING_MANA};
pub use logging::{init_logging, init_test_logging, LogEntry, TestLogSubscriber};
pub use manager::{MatchManager, MatchSetup, RevealOutcome, WagerDetails};
pub use resolution::{refund_draw, settle_match, settle_surrender};
pub use rewards::{normalize_tier, RewardTable};
pub use signature::{AcceptAll, SignatureVerifier};
pub use wagering::{
    BetKind, BetStatus, BetTransaction, SlotStatus, WagerState, WagerStatus,
    DEFAULT_BET_TIME_LIMIT,
};
