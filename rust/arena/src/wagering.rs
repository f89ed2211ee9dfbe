//! Per-match wagering ladder.
//!
//! Every betting action runs the inactivity clock first: one read of
//! `last_bet_time` under the wager lock decides both the timeout and the
//! action, so a stale read can never let an action both succeed and be
//! forfeited. On expiry the acting player's opponent wins the wager and the
//! match, and the attempted action is rejected.
//!
//! The ladder resets to pending at the start of every new battle round while
//! the match stays active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::errors::ArenaError;

/// Default inactivity window before a wager action forfeits the match.
pub const DEFAULT_BET_TIME_LIMIT: Duration = Duration::from_secs(30);

/// Lifecycle of a single bet transaction. Pending bets can be called,
/// raised over, or folded against; anything else is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Called,
    Raised,
    Folded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetKind {
    Bet,
    Raise,
}

/// Where one player sits in the current round's ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Checked,
    Bet,
    Called,
    Raised,
    Folded,
}

/// Ladder status for the wager as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerStatus {
    Pending,
    Checked,
    Bet,
    Called,
    Raised,
    Folded,
    Forfeited,
    Settled,
}

impl WagerStatus {
    /// Folded, forfeited, and settled wagers accept no further actions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WagerStatus::Folded | WagerStatus::Forfeited | WagerStatus::Settled
        )
    }
}

/// Immutable record of one bet or raise. Status is the only field that
/// changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetTransaction {
    pub id: String,
    pub player: String,
    pub round: u32,
    pub amount: u64,
    pub signature: String,
    pub kind: BetKind,
    pub status: BetStatus,
    pub created_at: DateTime<Utc>,
}

/// Wagering state for one match. The manager holds this behind a mutex;
/// all methods assume they run under that lock.
#[derive(Debug)]
pub struct WagerState {
    pub match_id: String,
    pub players: [String; 2],
    /// Mana each side has committed so far.
    pub stakes: [u64; 2],
    pub total_pool: u64,
    pub status: WagerStatus,
    pub slot_status: [SlotStatus; 2],
    /// Primary transaction store keyed by id.
    transactions: HashMap<String, BetTransaction>,
    /// Ordered mirror of every transaction, updated in step with the map.
    bet_log: Vec<BetTransaction>,
    pub winner: Option<String>,
    pub round: u32,
    last_bet_time: Instant,
    pub bet_time_limit: Duration,
    pub created_at: DateTime<Utc>,
}

impl WagerState {
    pub fn new(match_id: &str, players: [String; 2], bet_time_limit: Duration) -> Self {
        Self {
            match_id: match_id.to_string(),
            players,
            stakes: [0, 0],
            total_pool: 0,
            status: WagerStatus::Pending,
            slot_status: [SlotStatus::Pending, SlotStatus::Pending],
            transactions: HashMap::new(),
            bet_log: Vec::new(),
            winner: None,
            round: 1,
            last_bet_time: Instant::now(),
            bet_time_limit,
            created_at: Utc::now(),
        }
    }

    fn player_index(&self, player: &str) -> Result<usize, ArenaError> {
        self.players
            .iter()
            .position(|p| p == player)
            .ok_or_else(|| ArenaError::UnknownPlayer(player.to_string()))
    }

    fn opponent_of(&self, index: usize) -> &str {
        &self.players[1 - index]
    }

    /// Single consistent read of the inactivity clock. On expiry the actor's
    /// opponent takes the wager by forfeit and the caller's action is
    /// rejected; the attached match must be closed with the same winner.
    fn guard(&mut self, actor: usize) -> Result<(), ArenaError> {
        if self.status.is_terminal() {
            return Err(ArenaError::InvalidAction(format!(
                "wager for match {} is already closed",
                self.match_id
            )));
        }
        let elapsed = self.last_bet_time.elapsed();
        if elapsed > self.bet_time_limit {
            let winner = self.opponent_of(actor).to_string();
            self.status = WagerStatus::Forfeited;
            self.winner = Some(winner.clone());
            return Err(ArenaError::BetTimeLimitExceeded { winner });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_bet_time = Instant::now();
    }

    /// Looks up a pending transaction that the actor may act on: it must
    /// exist, belong to the current round, belong to the *other* player, and
    /// still be pending.
    fn actionable(&self, actor: &str, bet_id: &str) -> Result<&BetTransaction, ArenaError> {
        let tx = self
            .transactions
            .get(bet_id)
            .ok_or_else(|| ArenaError::BetTransactionNotFound(bet_id.to_string()))?;
        if tx.round != self.round {
            return Err(ArenaError::TransactionNotInWager(bet_id.to_string()));
        }
        if tx.player == actor {
            return Err(ArenaError::SelfActionNotAllowed);
        }
        if tx.status != BetStatus::Pending {
            return Err(ArenaError::InvalidTransactionState {
                id: bet_id.to_string(),
                status: tx.status,
            });
        }
        Ok(tx)
    }

    fn set_tx_status(&mut self, bet_id: &str, status: BetStatus) {
        if let Some(tx) = self.transactions.get_mut(bet_id) {
            tx.status = status;
        }
        if let Some(entry) = self.bet_log.iter_mut().find(|t| t.id == bet_id) {
            entry.status = status;
        }
    }

    /// No monetary effect; marks the player's slot as checked.
    pub fn check(&mut self, player: &str) -> Result<(), ArenaError> {
        let idx = self.player_index(player)?;
        self.guard(idx)?;
        if self.slot_status[idx] != SlotStatus::Pending {
            return Err(ArenaError::InvalidAction(format!(
                "{player} has already acted this round"
            )));
        }
        self.slot_status[idx] = SlotStatus::Checked;
        if self.status == WagerStatus::Pending {
            self.status = WagerStatus::Checked;
        }
        self.touch();
        Ok(())
    }

    /// Opens a pending bet transaction. Money moves only when the bet is
    /// called or raised over.
    pub fn bet(
        &mut self,
        player: &str,
        amount: u64,
        signature: &str,
    ) -> Result<String, ArenaError> {
        let idx = self.player_index(player)?;
        self.guard(idx)?;
        if amount == 0 {
            return Err(ArenaError::InvalidAction("bet amount must be positive".into()));
        }
        let tx = BetTransaction {
            id: Uuid::new_v4().to_string(),
            player: player.to_string(),
            round: self.round,
            amount,
            signature: signature.to_string(),
            kind: BetKind::Bet,
            status: BetStatus::Pending,
            created_at: Utc::now(),
        };
        let id = tx.id.clone();
        self.bet_log.push(tx.clone());
        self.transactions.insert(id.clone(), tx);
        self.slot_status[idx] = SlotStatus::Bet;
        self.status = WagerStatus::Bet;
        self.touch();
        Ok(id)
    }

    /// Matches the referenced bet: both sides commit its amount, doubling it
    /// into the pool. `fund` runs after validation and before any mutation
    /// with the matched amount; when it fails (e.g. a ledger deduction
    /// bounces) the wager is left untouched. Returns the matched amount so
    /// the caller can grow the match pool.
    pub fn call(
        &mut self,
        player: &str,
        bet_id: &str,
        fund: impl FnOnce(u64) -> Result<(), ArenaError>,
    ) -> Result<u64, ArenaError> {
        let idx = self.player_index(player)?;
        self.guard(idx)?;
        let amount = self.actionable(player, bet_id)?.amount;
        fund(amount)?;
        self.set_tx_status(bet_id, BetStatus::Called);
        self.stakes[0] += amount;
        self.stakes[1] += amount;
        self.total_pool += 2 * amount;
        self.slot_status[idx] = SlotStatus::Called;
        self.status = WagerStatus::Called;
        self.touch();
        Ok(amount)
    }

    /// Matches the referenced bet (its amount is committed by both sides,
    /// exactly as a call) and opens a fresh pending transaction for the
    /// raise, which must itself be called or folded in turn. Returns the
    /// matched amount and the new transaction id. `fund` behaves as in
    /// [`WagerState::call`].
    pub fn raise(
        &mut self,
        player: &str,
        bet_id: &str,
        raise_amount: u64,
        signature: &str,
        fund: impl FnOnce(u64) -> Result<(), ArenaError>,
    ) -> Result<(u64, String), ArenaError> {
        let idx = self.player_index(player)?;
        self.guard(idx)?;
        if raise_amount == 0 {
            return Err(ArenaError::InvalidAction(
                "raise amount must be positive".into(),
            ));
        }
        let matched = self.actionable(player, bet_id)?.amount;
        fund(matched)?;
        self.set_tx_status(bet_id, BetStatus::Raised);
        self.stakes[0] += matched;
        self.stakes[1] += matched;
        self.total_pool += 2 * matched;

        let tx = BetTransaction {
            id: Uuid::new_v4().to_string(),
            player: player.to_string(),
            round: self.round,
            amount: raise_amount,
            signature: signature.to_string(),
            kind: BetKind::Raise,
            status: BetStatus::Pending,
            created_at: Utc::now(),
        };
        let raise_id = tx.id.clone();
        self.bet_log.push(tx.clone());
        self.transactions.insert(raise_id.clone(), tx);
        self.slot_status[idx] = SlotStatus::Raised;
        self.status = WagerStatus::Raised;
        self.touch();
        Ok((matched, raise_id))
    }

    /// Concedes against the referenced bet. The *original bettor* wins the
    /// wager; the attached match must be closed with the same winner.
    pub fn fold(&mut self, player: &str, bet_id: &str) -> Result<String, ArenaError> {
        let idx = self.player_index(player)?;
        self.guard(idx)?;
        let winner = self.actionable(player, bet_id)?.player.clone();
        self.set_tx_status(bet_id, BetStatus::Folded);
        self.slot_status[idx] = SlotStatus::Folded;
        self.status = WagerStatus::Folded;
        self.winner = Some(winner.clone());
        self.touch();
        Ok(winner)
    }

    /// Round advanced: both slots and the ladder go back to pending. A
    /// closed wager stays closed.
    pub fn reset_for_round(&mut self, round: u32) {
        if self.status.is_terminal() {
            return;
        }
        self.round = round;
        self.status = WagerStatus::Pending;
        self.slot_status = [SlotStatus::Pending, SlotStatus::Pending];
        self.touch();
    }

    /// Match resolution closes the wager.
    pub fn settle(&mut self, winner: Option<&str>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = WagerStatus::Settled;
        self.winner = winner.map(str::to_string);
    }

    /// Seconds left on the inactivity clock, plus whether it has expired.
    pub fn time_remaining(&self) -> (u64, bool) {
        let elapsed = self.last_bet_time.elapsed();
        if elapsed > self.bet_time_limit {
            (0, true)
        } else {
            ((self.bet_time_limit - elapsed).as_secs(), false)
        }
    }

    pub fn transaction(&self, bet_id: &str) -> Option<&BetTransaction> {
        self.transactions.get(bet_id)
    }

    pub fn bet_log(&self) -> &[BetTransaction] {
        &self.bet_log
    }

    #[cfg(test)]
    pub fn force_last_bet_time(&mut self, age: Duration) {
        self.last_bet_time = Instant::now() - age;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wager() -> WagerState {
        WagerState::new(
            "m-1",
            ["alice".to_string(), "bob".to_string()],
            DEFAULT_BET_TIME_LIMIT,
        )
    }

    #[test]
    fn check_marks_the_slot_without_money_movement() {
        let mut w = wager();
        w.check("alice").unwrap();
        assert_eq!(w.slot_status[0], SlotStatus::Checked);
        assert_eq!(w.status, WagerStatus::Checked);
        assert_eq!(w.total_pool, 0);
        let err = w.check("alice").unwrap_err();
        assert!(matches!(err, ArenaError::InvalidAction(_)));
    }

    #[test]
    fn bet_then_call_doubles_the_amount_into_the_pool() {
        let mut w = wager();
        let bet_id = w.bet("alice", 50, "sig-a").unwrap();
        assert_eq!(w.total_pool, 0);

        let matched = w.call("bob", &bet_id, |_| Ok(())).unwrap();
        assert_eq!(matched, 50);
        assert_eq!(w.stakes, [50, 50]);
        assert_eq!(w.total_pool, 100);
        assert_eq!(w.status, WagerStatus::Called);
        assert_eq!(w.transaction(&bet_id).unwrap().status, BetStatus::Called);
        // Mirror entry tracks the primary record.
        assert_eq!(w.bet_log()[0].status, BetStatus::Called);
    }

    #[test]
    fn calling_your_own_bet_is_rejected() {
        let mut w = wager();
        let bet_id = w.bet("alice", 10, "sig-a").unwrap();
        assert_eq!(
            w.call("alice", &bet_id, |_| Ok(())).unwrap_err(),
            ArenaError::SelfActionNotAllowed
        );
        assert_eq!(w.total_pool, 0);
    }

    #[test]
    fn resolved_transactions_cannot_be_acted_on_again() {
        let mut w = wager();
        let bet_id = w.bet("alice", 10, "sig-a").unwrap();
        w.call("bob", &bet_id, |_| Ok(())).unwrap();
        let err = w.call("bob", &bet_id, |_| Ok(())).unwrap_err();
        assert_eq!(
            err,
            ArenaError::InvalidTransactionState {
                id: bet_id,
                status: BetStatus::Called,
            }
        );
        assert_eq!(w.total_pool, 20);
    }

    #[test]
    fn failed_funding_leaves_the_wager_untouched() {
        let mut w = wager();
        let bet_id = w.bet("alice", 10, "sig-a").unwrap();
        let err = w
            .call("bob", &bet_id, |_| {
                Err(ArenaError::InsufficientBalance {
                    currency: "mana",
                    available: 5.0,
                    required: 10.0,
                })
            })
            .unwrap_err();
        assert!(matches!(err, ArenaError::InsufficientBalance { .. }));
        assert_eq!(w.status, WagerStatus::Bet);
        assert_eq!(w.total_pool, 0);
        assert_eq!(w.stakes, [0, 0]);
        assert_eq!(w.transaction(&bet_id).unwrap().status, BetStatus::Pending);
    }

    #[test]
    fn raise_matches_the_original_and_opens_a_new_pending_bet() {
        let mut w = wager();
        let bet_id = w.bet("alice", 30, "sig-a").unwrap();
        let (matched, raise_id) = w.raise("bob", &bet_id, 40, "sig-b", |_| Ok(())).unwrap();
        assert_eq!(matched, 30);
        assert_eq!(w.stakes, [30, 30]);
        assert_eq!(w.total_pool, 60);
        assert_eq!(w.status, WagerStatus::Raised);

        let raise_tx = w.transaction(&raise_id).unwrap();
        assert_eq!(raise_tx.kind, BetKind::Raise);
        assert_eq!(raise_tx.status, BetStatus::Pending);
        assert_eq!(raise_tx.amount, 40);
        assert_eq!(w.transaction(&bet_id).unwrap().status, BetStatus::Raised);

        // The raise is itself callable by the original bettor.
        let matched = w.call("alice", &raise_id, |_| Ok(())).unwrap();
        assert_eq!(matched, 40);
        assert_eq!(w.total_pool, 140);
    }

    #[test]
    fn fold_awards_the_original_bettor() {
        let mut w = wager();
        let bet_id = w.bet("alice", 25, "sig-a").unwrap();
        let winner = w.fold("bob", &bet_id).unwrap();
        assert_eq!(winner, "alice");
        assert_eq!(w.status, WagerStatus::Folded);
        assert_eq!(w.winner.as_deref(), Some("alice"));
        // Closed wager rejects everything afterwards.
        assert!(matches!(
            w.check("alice").unwrap_err(),
            ArenaError::InvalidAction(_)
        ));
    }

    #[test]
    fn expired_clock_forfeits_to_the_opponent_whatever_the_action() {
        let mut w = wager();
        let bet_id = w.bet("alice", 10, "sig-a").unwrap();
        w.force_last_bet_time(Duration::from_secs(31));
        // Bob's call would have been valid, but the timeout short-circuits.
        let err = w.call("bob", &bet_id, |_| Ok(())).unwrap_err();
        assert_eq!(
            err,
            ArenaError::BetTimeLimitExceeded {
                winner: "alice".to_string()
            }
        );
        assert_eq!(w.status, WagerStatus::Forfeited);
        assert_eq!(w.winner.as_deref(), Some("alice"));
        assert_eq!(w.total_pool, 0);
    }

    #[test]
    fn expired_clock_forfeits_the_actor_even_on_a_check() {
        let mut w = wager();
        w.force_last_bet_time(Duration::from_secs(31));
        let err = w.check("alice").unwrap_err();
        assert_eq!(
            err,
            ArenaError::BetTimeLimitExceeded {
                winner: "bob".to_string()
            }
        );
    }

    #[test]
    fn round_reset_returns_the_ladder_to_pending() {
        let mut w = wager();
        let bet_id = w.bet("alice", 10, "sig-a").unwrap();
        w.call("bob", &bet_id, |_| Ok(())).unwrap();
        w.reset_for_round(2);
        assert_eq!(w.status, WagerStatus::Pending);
        assert_eq!(w.slot_status, [SlotStatus::Pending, SlotStatus::Pending]);
        assert_eq!(w.round, 2);
        // Committed stakes survive the reset.
        assert_eq!(w.total_pool, 20);
        // Last round's transaction is no longer actionable.
        assert_eq!(
            w.call("bob", &bet_id, |_| Ok(())).unwrap_err(),
            ArenaError::TransactionNotInWager(bet_id)
        );
    }

    #[test]
    fn unknown_transaction_is_a_not_found_error() {
        let mut w = wager();
        assert_eq!(
            w.call("bob", "missing", |_| Ok(())).unwrap_err(),
            ArenaError::BetTransactionNotFound("missing".to_string())
        );
    }

    #[test]
    fn time_remaining_reports_the_expired_flag() {
        let mut w = wager();
        let (left, expired) = w.time_remaining();
        assert!(!expired);
        assert!(left <= 30);
        w.force_last_bet_time(Duration::from_secs(45));
        let (left, expired) = w.time_remaining();
        assert!(expired);
        assert_eq!(left, 0);
    }
}
