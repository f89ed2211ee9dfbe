//! Match orchestration.
//!
//! One [`MatchManager`] owns every live match behind a read-mostly map of
//! handles; each handle carries its own state and wager locks so matches
//! progress independently. Lock order within a match is always state, then
//! wager. The per-match state lock is the serialization point for round
//! resolution: a near-simultaneous double reveal simulates the round exactly
//! once.
//!
//! Matchmaking happens upstream; the manager consumes a fully-formed
//! [`MatchSetup`] and never selects opponents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use runeclash_engine::cards::{CardCatalog, CardId};
use runeclash_engine::progress::{record_reveal, resolve_round, RoundResolution};
use runeclash_engine::state::{MatchState, MatchStatus, MatchType};

use crate::errors::ArenaError;
use crate::ledger::{Currency, Ledger};
use crate::resolution;
use crate::rewards::RewardTable;
use crate::signature::{AcceptAll, SignatureVerifier};
use crate::wagering::{BetTransaction, SlotStatus, WagerState, WagerStatus, DEFAULT_BET_TIME_LIMIT};

/// Everything matchmaking decides for a new match.
#[derive(Debug, Clone)]
pub struct MatchSetup {
    pub players: [String; 2],
    pub rank: String,
    pub match_type: MatchType,
    /// Buy-in deducted from each player's mana at registration.
    pub initial_stake: u64,
}

/// What a reveal produced: either we are still waiting on the opponent, or
/// both reveals were in and the round resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    Waiting,
    Resolved(RoundResolution),
}

/// Read-only wager view for reporting, with the inactivity clock computed
/// at query time.
#[derive(Debug, Clone, Serialize)]
pub struct WagerDetails {
    pub match_id: String,
    pub players: [String; 2],
    pub stakes: [u64; 2],
    pub total_pool: u64,
    pub status: WagerStatus,
    pub slot_status: [SlotStatus; 2],
    pub winner: Option<String>,
    pub round: u32,
    pub time_remaining_secs: u64,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
    pub transactions: Vec<BetTransaction>,
}

struct MatchHandle {
    state: Mutex<MatchState>,
    wager: Mutex<WagerState>,
}

pub struct MatchManager {
    matches: RwLock<HashMap<String, Arc<MatchHandle>>>,
    /// username → match id, so a player can be in at most one match.
    active_players: RwLock<HashMap<String, String>>,
    ledger: Arc<Ledger>,
    rewards: RewardTable,
    catalog: Arc<dyn CardCatalog + Send + Sync>,
    verifier: Arc<dyn SignatureVerifier>,
    bet_time_limit: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ArenaError> {
    mutex.lock().map_err(|_| ArenaError::StoragePoisoned)
}

impl MatchManager {
    pub fn new(ledger: Arc<Ledger>, catalog: Arc<dyn CardCatalog + Send + Sync>) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            active_players: RwLock::new(HashMap::new()),
            ledger,
            rewards: RewardTable::default(),
            catalog,
            verifier: Arc::new(AcceptAll),
            bet_time_limit: DEFAULT_BET_TIME_LIMIT,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_rewards(mut self, rewards: RewardTable) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_bet_time_limit(mut self, limit: Duration) -> Self {
        self.bet_time_limit = limit;
        self
    }

    fn handle(&self, match_id: &str) -> Result<Arc<MatchHandle>, ArenaError> {
        let guard = self
            .matches
            .read()
            .map_err(|_| ArenaError::StoragePoisoned)?;
        guard
            .get(match_id)
            .cloned()
            .ok_or_else(|| ArenaError::MatchNotFound(match_id.to_string()))
    }

    fn authorize(&self, player: &str, payload: &str, signature: &str) -> Result<(), ArenaError> {
        if self.verifier.verify(player, payload, signature) {
            Ok(())
        } else {
            Err(ArenaError::InvalidSignature(player.to_string()))
        }
    }

    fn release_players(&self, players: &[String; 2]) -> Result<(), ArenaError> {
        let mut guard = self
            .active_players
            .write()
            .map_err(|_| ArenaError::StoragePoisoned)?;
        for p in players {
            guard.remove(p);
        }
        Ok(())
    }

    /// Closes the match with `winner` and frees both players, without any
    /// RET or XP settlement. Fold and forfeit end here.
    fn finish_without_settlement(
        &self,
        state: &mut MatchState,
        winner: &str,
    ) -> Result<(), ArenaError> {
        if state.status.accepts_play() {
            state.set_status(MatchStatus::Completed)?;
        }
        state.winner = Some(winner.to_string());
        self.release_players(&state.players)
    }

    /// Creates the match and its wager together, charging each player's
    /// buy-in. A player already in a match, or a failed deduction, aborts
    /// registration with no effects left behind.
    pub fn register_match(&self, setup: MatchSetup) -> Result<String, ArenaError> {
        let [p0, p1] = &setup.players;
        if p0 == p1 {
            return Err(ArenaError::InvalidAction(
                "a match needs two distinct players".into(),
            ));
        }

        let match_id = Uuid::new_v4().to_string();
        {
            // Held across the deductions so two concurrent registrations
            // cannot both claim the same player.
            let mut active = self
                .active_players
                .write()
                .map_err(|_| ArenaError::StoragePoisoned)?;
            for p in &setup.players {
                if active.contains_key(p) {
                    return Err(ArenaError::InvalidAction(format!(
                        "{p} is already in a match"
                    )));
                }
            }

            let stake = setup.initial_stake as f64;
            if setup.initial_stake > 0 {
                self.ledger
                    .deduct(p0, stake, Currency::Mana, Some(&match_id), "Match stake")?;
                if let Err(err) =
                    self.ledger
                        .deduct(p1, stake, Currency::Mana, Some(&match_id), "Match stake")
                {
                    let _ = self.ledger.credit(
                        p0,
                        stake,
                        Currency::Mana,
                        Some(&match_id),
                        "Match stake refund",
                    );
                    return Err(err);
                }
            }

            active.insert(p0.clone(), match_id.clone());
            active.insert(p1.clone(), match_id.clone());
        }

        let pool = 2 * setup.initial_stake;
        let state = MatchState::new(
            match_id.clone(),
            setup.players.clone(),
            setup.rank.clone(),
            setup.match_type,
            pool,
        );
        let mut wager = WagerState::new(&match_id, setup.players.clone(), self.bet_time_limit);
        wager.stakes = [setup.initial_stake, setup.initial_stake];
        wager.total_pool = pool;

        let handle = Arc::new(MatchHandle {
            state: Mutex::new(state),
            wager: Mutex::new(wager),
        });
        self.matches
            .write()
            .map_err(|_| ArenaError::StoragePoisoned)?
            .insert(match_id.clone(), handle);

        info!(
            match_id = %match_id,
            players = ?setup.players,
            rank = %setup.rank,
            stake = setup.initial_stake,
            "match registered"
        );
        Ok(match_id)
    }

    /// Stores a player's deck hash; when both are in, the match moves to
    /// decks-submitted.
    pub fn submit_deck(
        &self,
        match_id: &str,
        player: &str,
        deck_hash: &str,
    ) -> Result<(), ArenaError> {
        let handle = self.handle(match_id)?;
        let mut state = lock(&handle.state)?;
        state.record_deck(player, deck_hash.to_string())?;
        Ok(())
    }

    /// Stores the player's card-selection commitment for the current round.
    pub fn submit_commitment(
        &self,
        match_id: &str,
        player: &str,
        hash: &str,
    ) -> Result<(), ArenaError> {
        let handle = self.handle(match_id)?;
        let mut state = lock(&handle.state)?;
        state.record_commitment(player, hash.to_string())?;
        Ok(())
    }

    /// Verifies and records a reveal. When it is the second reveal of the
    /// round, the round resolves under the same state lock; on a winner or
    /// a draw the match settles, otherwise the wager ladder resets for the
    /// next round.
    pub fn reveal_cards(
        &self,
        match_id: &str,
        player: &str,
        cards: [CardId; 3],
        signature: &str,
    ) -> Result<RevealOutcome, ArenaError> {
        let payload = format!(
            "reveal:{match_id}:{},{},{}",
            cards[0], cards[1], cards[2]
        );
        self.authorize(player, &payload, signature)?;

        let handle = self.handle(match_id)?;
        let mut state = lock(&handle.state)?;
        let both_revealed = record_reveal(&mut state, player, cards)?;
        if !both_revealed {
            return Ok(RevealOutcome::Waiting);
        }

        let round = state.round;
        let outcome = resolve_round(&mut state, self.catalog.as_ref())?;
        let mut wager = lock(&handle.wager)?;
        match &outcome {
            RoundResolution::RoundAdvanced { round: next } => {
                wager.reset_for_round(*next);
                info!(match_id, round, next_round = next, "round resolved, match continues");
            }
            RoundResolution::WinnerFound { winner, loser } => {
                resolution::settle_match(&self.ledger, &self.rewards, &mut state, &mut wager)?;
                self.release_players(&state.players)?;
                info!(match_id, round, winner = %winner, loser = %loser, "match won");
            }
            RoundResolution::Draw => {
                resolution::refund_draw(&self.ledger, &state, &mut wager)?;
                self.release_players(&state.players)?;
                info!(match_id, round, "match drawn");
            }
        }
        Ok(RevealOutcome::Resolved(outcome))
    }

    /// The surrendering player's opponent wins; settled with the payout but
    /// no experience movement.
    pub fn surrender(&self, match_id: &str, player: &str) -> Result<String, ArenaError> {
        let handle = self.handle(match_id)?;
        let mut state = lock(&handle.state)?;
        if !state.status.accepts_play() {
            return Err(ArenaError::InvalidAction(format!(
                "match {match_id} is already completed"
            )));
        }
        let winner = state
            .opponent_of(player)
            .ok_or_else(|| ArenaError::UnknownPlayer(player.to_string()))?
            .to_string();
        state.set_status(MatchStatus::Completed)?;
        state.winner = Some(winner.clone());

        let mut wager = lock(&handle.wager)?;
        resolution::settle_surrender(&self.ledger, &self.rewards, &mut state, &mut wager)?;
        self.release_players(&state.players)?;
        info!(match_id, surrendered = player, winner = %winner, "match surrendered");
        Ok(winner)
    }

    /// Runs a wager action under the state and wager locks. A tripped
    /// inactivity clock closes the match for the actor's opponent and the
    /// rejection is passed through.
    fn wager_action<T>(
        &self,
        match_id: &str,
        f: impl FnOnce(&mut MatchState, &mut WagerState) -> Result<T, ArenaError>,
    ) -> Result<T, ArenaError> {
        let handle = self.handle(match_id)?;
        let mut state = lock(&handle.state)?;
        let mut wager = lock(&handle.wager)?;
        match f(&mut state, &mut wager) {
            Err(ArenaError::BetTimeLimitExceeded { winner }) => {
                warn!(match_id, winner = %winner, "bet time limit exceeded, match forfeited");
                self.finish_without_settlement(&mut state, &winner)?;
                Err(ArenaError::BetTimeLimitExceeded { winner })
            }
            other => other,
        }
    }

    pub fn check(&self, match_id: &str, player: &str) -> Result<(), ArenaError> {
        self.wager_action(match_id, |_state, wager| wager.check(player))
    }

    /// Opens a bet. No mana moves until the bet is called or raised over.
    pub fn bet(
        &self,
        match_id: &str,
        player: &str,
        amount: u64,
        signature: &str,
    ) -> Result<String, ArenaError> {
        let payload = format!("bet:{match_id}:{amount}");
        self.authorize(player, &payload, signature)?;
        self.wager_action(match_id, |_state, wager| wager.bet(player, amount, signature))
    }

    /// Calls a pending bet: its amount is deducted from both players and
    /// doubled into the pools. A bounced deduction refunds the other side
    /// and leaves the wager untouched.
    pub fn call(
        &self,
        match_id: &str,
        player: &str,
        bet_id: &str,
        signature: &str,
    ) -> Result<u64, ArenaError> {
        let payload = format!("call:{match_id}:{bet_id}");
        self.authorize(player, &payload, signature)?;
        self.wager_action(match_id, |state, wager| {
            let players = wager.players.clone();
            let amount = wager.call(player, bet_id, |amount| {
                self.stake_both(&players, amount, match_id)
            })?;
            state.total_mana_pool += 2 * amount;
            Ok(amount)
        })
    }

    /// Raises over a pending bet: the original amount is committed by both
    /// sides and a new pending transaction opens for the raise.
    pub fn raise(
        &self,
        match_id: &str,
        player: &str,
        bet_id: &str,
        raise_amount: u64,
        signature: &str,
    ) -> Result<(u64, String), ArenaError> {
        let payload = format!("raise:{match_id}:{bet_id}:{raise_amount}");
        self.authorize(player, &payload, signature)?;
        self.wager_action(match_id, |state, wager| {
            let players = wager.players.clone();
            let (matched, raise_id) =
                wager.raise(player, bet_id, raise_amount, signature, |amount| {
                    self.stake_both(&players, amount, match_id)
                })?;
            state.total_mana_pool += 2 * matched;
            Ok((matched, raise_id))
        })
    }

    /// Folds against a pending bet. The original bettor wins the wager and
    /// the match; no settlement is paid.
    pub fn fold(
        &self,
        match_id: &str,
        player: &str,
        bet_id: &str,
        signature: &str,
    ) -> Result<String, ArenaError> {
        let payload = format!("fold:{match_id}:{bet_id}");
        self.authorize(player, &payload, signature)?;
        self.wager_action(match_id, |state, wager| {
            let winner = wager.fold(player, bet_id)?;
            self.finish_without_settlement(state, &winner)?;
            info!(match_id, folded = player, winner = %winner, "wager folded");
            Ok(winner)
        })
    }

    fn stake_both(
        &self,
        players: &[String; 2],
        amount: u64,
        match_id: &str,
    ) -> Result<(), ArenaError> {
        let amount = amount as f64;
        self.ledger
            .deduct(&players[0], amount, Currency::Mana, Some(match_id), "Wager stake")?;
        if let Err(err) =
            self.ledger
                .deduct(&players[1], amount, Currency::Mana, Some(match_id), "Wager stake")
        {
            let _ = self.ledger.credit(
                &players[0],
                amount,
                Currency::Mana,
                Some(match_id),
                "Wager stake refund",
            );
            return Err(err);
        }
        Ok(())
    }

    /// Point-in-time clone of the match state.
    pub fn match_details(&self, match_id: &str) -> Result<MatchState, ArenaError> {
        let handle = self.handle(match_id)?;
        let state = lock(&handle.state)?;
        Ok(state.clone())
    }

    pub fn wager_details(&self, match_id: &str) -> Result<WagerDetails, ArenaError> {
        let handle = self.handle(match_id)?;
        let wager = lock(&handle.wager)?;
        Ok(Self::details_of(&wager))
    }

    fn details_of(wager: &WagerState) -> WagerDetails {
        let (time_remaining_secs, expired) = wager.time_remaining();
        WagerDetails {
            match_id: wager.match_id.clone(),
            players: wager.players.clone(),
            stakes: wager.stakes,
            total_pool: wager.total_pool,
            status: wager.status,
            slot_status: wager.slot_status,
            winner: wager.winner.clone(),
            round: wager.round,
            time_remaining_secs,
            expired,
            created_at: wager.created_at,
            transactions: wager.bet_log().to_vec(),
        }
    }

    /// All wagers created inside `[start, end]`, oldest first.
    pub fn compliance_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WagerDetails>, ArenaError> {
        let handles: Vec<Arc<MatchHandle>> = {
            let guard = self
                .matches
                .read()
                .map_err(|_| ArenaError::StoragePoisoned)?;
            guard.values().cloned().collect()
        };
        let mut report = Vec::new();
        for handle in handles {
            let wager = lock(&handle.wager)?;
            if wager.created_at >= start && wager.created_at <= end {
                report.push(Self::details_of(&wager));
            }
        }
        report.sort_by_key(|d| d.created_at);
        Ok(report)
    }

    pub fn active_matches(&self) -> Vec<String> {
        self.matches
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Which match a player is currently in, if any.
    pub fn player_match(&self, username: &str) -> Option<String> {
        self.active_players
            .read()
            .ok()
            .and_then(|m| m.get(username).cloned())
    }

    #[cfg(test)]
    fn force_wager_age(&self, match_id: &str, age: Duration) -> Result<(), ArenaError> {
        let handle = self.handle(match_id)?;
        let mut wager = lock(&handle.wager)?;
        wager.force_last_bet_time(age);
        Ok(())
    }
}
