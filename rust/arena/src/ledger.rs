//! Economy ledger: player balances in two currencies plus append-only
//! histories. Every other component calls into the ledger, never the
//! reverse.
//!
//! Each account sits behind its own mutex, so a deduction is an atomic
//! check-and-decrement: concurrent wagers and settlements against the same
//! player can never drive a balance below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::errors::ArenaError;

/// Mana regenerates and funds ranked play; RET accumulates as match
/// rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Mana,
    Ret,
}

impl Currency {
    pub fn name(self) -> &'static str {
        match self {
            Currency::Mana => "mana",
            Currency::Ret => "ret",
        }
    }
}

/// One signed movement in a currency history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub date: DateTime<Utc>,
    pub change: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    pub reason: String,
}

/// Starting mana for a freshly registered player.
pub const STARTING_MANA: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAccount {
    pub username: String,
    pub rank: String,
    pub xp: u64,
    pub wins: u32,
    pub mana_balance: f64,
    pub ret_balance: f64,
    pub mana_history: Vec<BalanceEntry>,
    pub ret_history: Vec<BalanceEntry>,
}

impl PlayerAccount {
    fn new(username: &str, rank: &str) -> Self {
        Self {
            username: username.to_string(),
            rank: rank.to_string(),
            xp: 0,
            wins: 0,
            mana_balance: STARTING_MANA,
            ret_balance: 0.0,
            mana_history: Vec::new(),
            ret_history: Vec::new(),
        }
    }

    fn balance(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Mana => self.mana_balance,
            Currency::Ret => self.ret_balance,
        }
    }

    fn apply(&mut self, currency: Currency, change: f64, match_id: Option<&str>, reason: &str) {
        let entry = BalanceEntry {
            date: Utc::now(),
            change,
            match_id: match_id.map(str::to_string),
            reason: reason.to_string(),
        };
        match currency {
            Currency::Mana => {
                self.mana_balance += change;
                self.mana_history.push(entry);
            }
            Currency::Ret => {
                self.ret_balance += change;
                self.ret_history.push(entry);
            }
        }
    }
}

/// Keyed store of player accounts. The outer map is read-mostly; balance
/// mutation happens under the per-account mutex.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: RwLock<HashMap<String, Arc<Mutex<PlayerAccount>>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the account if it does not exist yet.
    pub fn register(&self, username: &str, rank: &str) -> Result<(), ArenaError> {
        let mut guard = self
            .accounts
            .write()
            .map_err(|_| ArenaError::StoragePoisoned)?;
        guard
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(PlayerAccount::new(username, rank))));
        Ok(())
    }

    fn account(&self, username: &str) -> Result<Arc<Mutex<PlayerAccount>>, ArenaError> {
        let guard = self
            .accounts
            .read()
            .map_err(|_| ArenaError::StoragePoisoned)?;
        guard
            .get(username)
            .cloned()
            .ok_or_else(|| ArenaError::PlayerNotFound(username.to_string()))
    }

    /// Atomically verifies `balance >= amount` and decrements, appending a
    /// history entry. Fails with `InsufficientBalance` without any state
    /// change when the precondition does not hold at the moment of the
    /// update.
    pub fn deduct(
        &self,
        username: &str,
        amount: f64,
        currency: Currency,
        match_id: Option<&str>,
        reason: &str,
    ) -> Result<f64, ArenaError> {
        let account = self.account(username)?;
        let mut account = account.lock().map_err(|_| ArenaError::StoragePoisoned)?;
        let available = account.balance(currency);
        if available < amount {
            return Err(ArenaError::InsufficientBalance {
                currency: currency.name(),
                available,
                required: amount,
            });
        }
        account.apply(currency, -amount, match_id, reason);
        Ok(account.balance(currency))
    }

    /// Unconditional increment plus history append.
    pub fn credit(
        &self,
        username: &str,
        amount: f64,
        currency: Currency,
        match_id: Option<&str>,
        reason: &str,
    ) -> Result<f64, ArenaError> {
        let account = self.account(username)?;
        let mut account = account.lock().map_err(|_| ArenaError::StoragePoisoned)?;
        account.apply(currency, amount, match_id, reason);
        Ok(account.balance(currency))
    }

    pub fn balance(&self, username: &str, currency: Currency) -> Result<f64, ArenaError> {
        let account = self.account(username)?;
        let account = account.lock().map_err(|_| ArenaError::StoragePoisoned)?;
        Ok(account.balance(currency))
    }

    /// Experience gain, recorded in the mana history.
    pub fn add_xp(
        &self,
        username: &str,
        amount: u64,
        match_id: Option<&str>,
        reason: &str,
    ) -> Result<(), ArenaError> {
        let account = self.account(username)?;
        let mut account = account.lock().map_err(|_| ArenaError::StoragePoisoned)?;
        account.xp += amount;
        account.mana_history.push(BalanceEntry {
            date: Utc::now(),
            change: amount as f64,
            match_id: match_id.map(str::to_string),
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Experience loss, clamped at zero (never negative).
    pub fn deduct_xp(
        &self,
        username: &str,
        amount: u64,
        match_id: Option<&str>,
        reason: &str,
    ) -> Result<(), ArenaError> {
        let account = self.account(username)?;
        let mut account = account.lock().map_err(|_| ArenaError::StoragePoisoned)?;
        account.xp = account.xp.saturating_sub(amount);
        account.mana_history.push(BalanceEntry {
            date: Utc::now(),
            change: -(amount as f64),
            match_id: match_id.map(str::to_string),
            reason: reason.to_string(),
        });
        Ok(())
    }

    pub fn record_win(&self, username: &str) -> Result<(), ArenaError> {
        let account = self.account(username)?;
        let mut account = account.lock().map_err(|_| ArenaError::StoragePoisoned)?;
        account.wins += 1;
        Ok(())
    }

    /// Point-in-time clone of an account for reporting.
    pub fn snapshot(&self, username: &str) -> Result<PlayerAccount, ArenaError> {
        let account = self.account(username)?;
        let account = account.lock().map_err(|_| ArenaError::StoragePoisoned)?;
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ledger_with(username: &str) -> Ledger {
        let ledger = Ledger::new();
        ledger.register(username, "rookie1").unwrap();
        ledger
    }

    #[test]
    fn deduct_rejects_overdraw_without_state_change() {
        let ledger = ledger_with("alice");
        let err = ledger
            .deduct("alice", 150.0, Currency::Mana, None, "wager stake")
            .unwrap_err();
        assert!(matches!(err, ArenaError::InsufficientBalance { .. }));
        let account = ledger.snapshot("alice").unwrap();
        assert_eq!(account.mana_balance, STARTING_MANA);
        assert!(account.mana_history.is_empty());
    }

    #[test]
    fn credit_appends_history_with_match_reference() {
        let ledger = ledger_with("alice");
        ledger
            .credit("alice", 14.5, Currency::Ret, Some("m-1"), "Match win reward")
            .unwrap();
        let account = ledger.snapshot("alice").unwrap();
        assert_eq!(account.ret_balance, 14.5);
        assert_eq!(account.ret_history.len(), 1);
        assert_eq!(account.ret_history[0].match_id.as_deref(), Some("m-1"));
    }

    #[test]
    fn registration_is_idempotent() {
        let ledger = ledger_with("alice");
        ledger
            .credit("alice", 10.0, Currency::Mana, None, "top-up")
            .unwrap();
        ledger.register("alice", "rookie1").unwrap();
        assert_eq!(
            ledger.balance("alice", Currency::Mana).unwrap(),
            STARTING_MANA + 10.0
        );
    }

    #[test]
    fn xp_loss_clamps_at_zero() {
        let ledger = ledger_with("alice");
        ledger.add_xp("alice", 30, None, "win").unwrap();
        ledger.deduct_xp("alice", 100, None, "loss").unwrap();
        assert_eq!(ledger.snapshot("alice").unwrap().xp, 0);
    }

    #[test]
    fn concurrent_deductions_never_oversubscribe_a_balance() {
        let ledger = Arc::new(ledger_with("alice"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                let mut successes = 0usize;
                for _ in 0..25 {
                    if ledger
                        .deduct("alice", 10.0, Currency::Mana, None, "wager stake")
                        .is_ok()
                    {
                        successes += 1;
                    }
                }
                successes
            }));
        }

        let successes: usize = handles
            .into_iter()
            .map(|h| h.join().expect("join thread"))
            .sum();

        // Only ten 10-mana deductions fit in the starting 100.
        assert_eq!(successes, 10);
        let account = ledger.snapshot("alice").unwrap();
        assert_eq!(account.mana_balance, 0.0);
        // History entries equal exactly the number of successes.
        assert_eq!(account.mana_history.len(), successes);
    }

    #[test]
    fn unknown_player_is_a_not_found_error() {
        let ledger = Ledger::new();
        let err = ledger.balance("ghost", Currency::Mana).unwrap_err();
        assert_eq!(err, ArenaError::PlayerNotFound("ghost".to_string()));
    }
}
