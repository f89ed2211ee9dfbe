use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::battle::{AttackEvent, CombatCard, PlayerCombat};
use crate::cards::CardId;
use crate::errors::EngineError;

/// Hard cap on battle length; reaching it without a knockout resolves the
/// match on remaining base health.
pub const MAX_ROUNDS: u32 = 7;

/// Lifecycle of a match. Transitions not listed in
/// [`MatchStatus::can_transition_to`] are rejected rather than trusted to
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    DecksSubmitted,
    Completed,
}

impl MatchStatus {
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Active, MatchStatus::DecksSubmitted)
                | (MatchStatus::Active, MatchStatus::Completed)
                | (MatchStatus::DecksSubmitted, MatchStatus::Completed)
        )
    }

    /// Whether the match accepts commitments and reveals.
    pub fn accepts_play(self) -> bool {
        !matches!(self, MatchStatus::Completed)
    }
}

/// Which currency the match is staked in. Ranked matches (mana) move XP at
/// settlement; wagered matches (RET) do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Ranked,
    Wagered,
}

/// Settlement record written exactly once when the match resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub ret_amount: f64,
    pub ret_credited: bool,
    pub winner: String,
    pub xp_gained: u64,
    pub xp_lost: u64,
}

/// Full state of one battle session. Append-mostly: round data is written
/// once per round and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub match_id: String,
    /// Order-significant: index 0 is "slot 1", index 1 is "slot 2".
    pub players: [String; 2],
    pub round: u32,
    pub status: MatchStatus,
    pub match_type: MatchType,
    /// Rank tier used for the reward lookup at settlement.
    pub rank: String,
    pub winner: Option<String>,
    pub rewards: Option<RewardRecord>,
    /// Cumulative currency staked across the wager ladder.
    pub total_mana_pool: u64,
    pub stats: [PlayerCombat; 2],
    /// Deck hash per player, submitted before play begins.
    pub decks: [Option<String>; 2],
    /// Commitment hash per round and player; set once, immutable after.
    pub card_hashes: BTreeMap<u32, [Option<String>; 2]>,
    /// Revealed triples per round and player.
    pub cards_played: BTreeMap<u32, [Option<[CardId; 3]>; 2]>,
    /// Attack log per round, append-only.
    pub battle_history: BTreeMap<u32, Vec<AttackEvent>>,
    /// Post-round snapshot of each player's three slots; the authoritative
    /// input the next round's selections must match.
    pub remaining_cards: BTreeMap<u32, [[CombatCard; 3]; 2]>,
    pub created_at: DateTime<Utc>,
}

impl MatchState {
    pub fn new(
        match_id: impl Into<String>,
        players: [String; 2],
        rank: impl Into<String>,
        match_type: MatchType,
        total_mana_pool: u64,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            players,
            round: 1,
            status: MatchStatus::Active,
            match_type,
            rank: rank.into(),
            winner: None,
            rewards: None,
            total_mana_pool,
            stats: [PlayerCombat::default(), PlayerCombat::default()],
            decks: [None, None],
            card_hashes: BTreeMap::new(),
            cards_played: BTreeMap::new(),
            battle_history: BTreeMap::new(),
            remaining_cards: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn player_index(&self, username: &str) -> Option<usize> {
        self.players.iter().position(|p| p == username)
    }

    pub fn opponent_of(&self, username: &str) -> Option<&str> {
        match self.player_index(username)? {
            0 => Some(self.players[1].as_str()),
            _ => Some(self.players[0].as_str()),
        }
    }

    /// Applies a status transition, rejecting anything outside the table.
    pub fn set_status(&mut self, next: MatchStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Records a commitment hash for `(round, player)`. Commitments are
    /// write-once; a second submission for the same slot is rejected.
    pub fn record_commitment(
        &mut self,
        player: &str,
        hash: String,
    ) -> Result<(), EngineError> {
        if !self.status.accepts_play() {
            return Err(EngineError::MatchNotActive);
        }
        let idx = self
            .player_index(player)
            .ok_or_else(|| EngineError::UnknownPlayer {
                player: player.to_string(),
            })?;
        let round = self.round;
        let slot = &mut self.card_hashes.entry(round).or_default()[idx];
        if slot.is_some() {
            return Err(EngineError::CommitmentAlreadySet {
                player: player.to_string(),
                round,
            });
        }
        *slot = Some(hash);
        Ok(())
    }

    pub fn commitment(&self, round: u32, idx: usize) -> Option<&str> {
        self.card_hashes.get(&round)?[idx].as_deref()
    }

    /// Records a deck hash for a player; when both are in, the match moves
    /// to `DecksSubmitted`.
    pub fn record_deck(&mut self, player: &str, deck_hash: String) -> Result<(), EngineError> {
        if !self.status.accepts_play() {
            return Err(EngineError::MatchNotActive);
        }
        let idx = self
            .player_index(player)
            .ok_or_else(|| EngineError::UnknownPlayer {
                player: player.to_string(),
            })?;
        self.decks[idx] = Some(deck_hash);
        if self.decks.iter().all(|d| d.is_some()) && self.status == MatchStatus::Active {
            self.set_status(MatchStatus::DecksSubmitted)?;
        }
        Ok(())
    }
}
