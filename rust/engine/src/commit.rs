//! Commit-reveal protocol for card selections.
//!
//! Each round a player first submits `selection_hash` of their ordered card
//! triple, then later reveals the plaintext triple. The reveal is accepted
//! only if its recomputed hash equals the stored commitment, which prevents
//! a player from changing their selection after seeing the opponent's hash.

use sha2::{Digest, Sha256};

use crate::cards::CardId;

/// SHA-256 commitment over the canonical JSON encoding of the ordered
/// card-id triple (e.g. `[12,7,999]`), as lowercase hex.
pub fn selection_hash(cards: &[CardId; 3]) -> String {
    let payload =
        serde_json::to_string(cards).expect("a fixed-size array of card ids always serializes");
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Checks a revealed triple against a stored commitment.
///
/// The comparison is constant-time in the commitment contents so the check
/// cannot leak how much of a guessed hash matched.
pub fn verify_selection(commitment: &str, cards: &[CardId; 3]) -> bool {
    constant_time_eq(selection_hash(cards).as_bytes(), commitment.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
