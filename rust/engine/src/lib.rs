//! # runeclash-engine: Match Round Engine Core
//!
//! Deterministic core for head-to-head card battles: commit-reveal card
//! selection, a speed-ordered battle simulator, and round/win-condition
//! progression. All state lives in plain data types; the service layer
//! (`runeclash-arena`) owns concurrency, wagering, and settlement.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card stats, the sentinel id, and the `CardCatalog` seam
//! - [`commit`] - SHA-256 commit-reveal of ordered card triples
//! - [`battle`] - One round of speed-ordered combat with seeded tie-breaks
//! - [`progress`] - Reveal recording, round resolution, and win conditions
//! - [`state`] - Match data model and status transition table
//! - [`errors`] - Typed engine errors
//!
//! ## Determinism
//!
//! Given identical card stats, identical selections, and the same match id
//! and round, two simulations produce identical battle histories and
//! resulting health values. Equal-speed ordering comes from a ChaCha20
//! stream keyed by `(match id, round)`, never from ambient randomness:
//!
//! ```rust
//! use runeclash_engine::battle::tie_seed;
//!
//! assert_eq!(tie_seed("match-1", 3), tie_seed("match-1", 3));
//! ```
//!
//! ## Commit-reveal
//!
//! ```rust
//! use runeclash_engine::commit::{selection_hash, verify_selection};
//!
//! let cards = [12, 7, 999];
//! let commitment = selection_hash(&cards);
//! assert!(verify_selection(&commitment, &cards));
//! assert!(!verify_selection(&commitment, &[12, 7, 3]));
//! ```

pub mod battle;
pub mod cards;
pub mod commit;
pub mod errors;
pub mod progress;
pub mod state;
