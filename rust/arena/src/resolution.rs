//! Match settlement: RET payout, XP movement, and the reward record.
//!
//! Settlement runs exactly once per match, after the engine has marked it
//! completed with a winner. Fold and forfeit close the match through the
//! wager ladder and never reach this module.

use tracing::info;

use runeclash_engine::state::{MatchState, MatchType, RewardRecord};

use crate::errors::ArenaError;
use crate::ledger::{Currency, Ledger};
use crate::rewards::RewardTable;
use crate::wagering::WagerState;

/// Settles a completed match on its own terms: RET by the rank tier, and
/// for ranked matches the full pool as winner XP with half of it (floored,
/// clamped at zero) taken from the loser.
pub fn settle_match(
    ledger: &Ledger,
    rewards: &RewardTable,
    state: &mut MatchState,
    wager: &mut WagerState,
) -> Result<RewardRecord, ArenaError> {
    let pool = state.total_mana_pool;
    let apply_xp = state.match_type == MatchType::Ranked;
    settle_with(ledger, rewards, state, wager, pool, apply_xp)
}

/// Settles a surrendered match: the payout still goes to the winner, but no
/// experience moves and the pool is treated as empty.
pub fn settle_surrender(
    ledger: &Ledger,
    rewards: &RewardTable,
    state: &mut MatchState,
    wager: &mut WagerState,
) -> Result<RewardRecord, ArenaError> {
    settle_with(ledger, rewards, state, wager, 0, false)
}

fn settle_with(
    ledger: &Ledger,
    rewards: &RewardTable,
    state: &mut MatchState,
    wager: &mut WagerState,
    pool: u64,
    apply_xp: bool,
) -> Result<RewardRecord, ArenaError> {
    let winner = state
        .winner
        .clone()
        .ok_or_else(|| ArenaError::InvalidAction("cannot settle a match without a winner".into()))?;
    if state.rewards.is_some() {
        return Err(ArenaError::InvalidAction(format!(
            "match {} is already settled",
            state.match_id
        )));
    }
    let loser = state
        .opponent_of(&winner)
        .ok_or_else(|| ArenaError::UnknownPlayer(winner.clone()))?
        .to_string();

    // Reward lookup comes first: a missing table row aborts the whole
    // settlement with no balances touched.
    let ret_amount = rewards.lookup(&state.rank)?;
    ledger.credit(
        &winner,
        ret_amount,
        Currency::Ret,
        Some(&state.match_id),
        "Match win reward",
    )?;

    let (xp_gained, xp_lost) = if apply_xp {
        let gained = pool;
        let lost = pool / 2;
        ledger.add_xp(&winner, gained, Some(&state.match_id), "Ranked match win")?;
        ledger.deduct_xp(&loser, lost, Some(&state.match_id), "Ranked match loss")?;
        (gained, lost)
    } else {
        (0, 0)
    };
    ledger.record_win(&winner)?;

    let record = RewardRecord {
        ret_amount,
        ret_credited: true,
        winner: winner.clone(),
        xp_gained,
        xp_lost,
    };
    state.rewards = Some(record.clone());
    wager.settle(Some(&winner));

    info!(
        match_id = %state.match_id,
        winner = %winner,
        ret_amount,
        xp_gained,
        xp_lost,
        "match settled"
    );
    Ok(record)
}

/// Closes a drawn match: each side's committed stake goes back to its
/// owner, no reward is paid, and no experience moves.
pub fn refund_draw(
    ledger: &Ledger,
    state: &MatchState,
    wager: &mut WagerState,
) -> Result<(), ArenaError> {
    if wager.status.is_terminal() {
        return Err(ArenaError::InvalidAction(format!(
            "wager for match {} is already closed",
            state.match_id
        )));
    }
    for (idx, player) in wager.players.clone().iter().enumerate() {
        let stake = wager.stakes[idx];
        if stake > 0 {
            ledger.credit(
                player,
                stake as f64,
                Currency::Mana,
                Some(&state.match_id),
                "Draw stake refund",
            )?;
        }
    }
    wager.settle(None);
    info!(match_id = %state.match_id, "match drawn, stakes refunded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::STARTING_MANA;
    use crate::wagering::{WagerStatus, DEFAULT_BET_TIME_LIMIT};
    use runeclash_engine::state::MatchStatus;

    fn fixtures(match_type: MatchType, pool: u64) -> (Ledger, MatchState, WagerState) {
        let ledger = Ledger::new();
        ledger.register("alice", "rookie1").unwrap();
        ledger.register("bob", "rookie1").unwrap();
        let mut state = MatchState::new(
            "m-1",
            ["alice".to_string(), "bob".to_string()],
            "rookie1",
            match_type,
            pool,
        );
        state.set_status(MatchStatus::Completed).unwrap();
        state.winner = Some("alice".to_string());
        let wager = WagerState::new(
            "m-1",
            ["alice".to_string(), "bob".to_string()],
            DEFAULT_BET_TIME_LIMIT,
        );
        (ledger, state, wager)
    }

    #[test]
    fn ranked_settlement_moves_ret_and_xp() {
        let (ledger, mut state, mut wager) = fixtures(MatchType::Ranked, 100);
        ledger.add_xp("bob", 30, None, "earlier win").unwrap();

        let record = settle_match(&ledger, &RewardTable::default(), &mut state, &mut wager).unwrap();

        let expected_ret = RewardTable::default().lookup("rookie1").unwrap();
        assert_eq!(record.ret_amount, expected_ret);
        assert_eq!(record.xp_gained, 100);
        assert_eq!(record.xp_lost, 50);

        let alice = ledger.snapshot("alice").unwrap();
        assert_eq!(alice.ret_balance, expected_ret);
        assert_eq!(alice.xp, 100);
        assert_eq!(alice.wins, 1);
        // Exactly one RET history entry, referencing this match.
        assert_eq!(alice.ret_history.len(), 1);
        assert_eq!(alice.ret_history[0].match_id.as_deref(), Some("m-1"));

        // Loser's XP is clamped, never negative.
        assert_eq!(ledger.snapshot("bob").unwrap().xp, 0);
        assert_eq!(wager.status, WagerStatus::Settled);
        assert_eq!(state.rewards, Some(record));
    }

    #[test]
    fn wagered_settlement_skips_experience() {
        let (ledger, mut state, mut wager) = fixtures(MatchType::Wagered, 100);
        let record = settle_match(&ledger, &RewardTable::default(), &mut state, &mut wager).unwrap();
        assert_eq!(record.xp_gained, 0);
        assert_eq!(record.xp_lost, 0);
        assert_eq!(ledger.snapshot("alice").unwrap().xp, 0);
        assert!(ledger.snapshot("alice").unwrap().ret_balance > 0.0);
    }

    #[test]
    fn missing_reward_row_aborts_without_touching_balances() {
        let (ledger, mut state, mut wager) = fixtures(MatchType::Ranked, 100);
        state.rank = "cosmic9".to_string();
        let err =
            settle_match(&ledger, &RewardTable::default(), &mut state, &mut wager).unwrap_err();
        assert_eq!(err, ArenaError::RewardConfigMissing("cosmic9".to_string()));
        assert_eq!(ledger.snapshot("alice").unwrap().ret_balance, 0.0);
        assert_eq!(ledger.snapshot("alice").unwrap().xp, 0);
        assert!(state.rewards.is_none());
        assert_ne!(wager.status, WagerStatus::Settled);
    }

    #[test]
    fn settlement_is_write_once() {
        let (ledger, mut state, mut wager) = fixtures(MatchType::Ranked, 10);
        settle_match(&ledger, &RewardTable::default(), &mut state, &mut wager).unwrap();
        // Reopen the wager artificially to isolate the match-side guard.
        let mut fresh = WagerState::new(
            "m-1",
            ["alice".to_string(), "bob".to_string()],
            DEFAULT_BET_TIME_LIMIT,
        );
        let err =
            settle_match(&ledger, &RewardTable::default(), &mut state, &mut fresh).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidAction(_)));
        assert_eq!(ledger.snapshot("alice").unwrap().ret_history.len(), 1);
    }

    #[test]
    fn surrender_settles_without_experience() {
        let (ledger, mut state, mut wager) = fixtures(MatchType::Ranked, 80);
        let record =
            settle_surrender(&ledger, &RewardTable::default(), &mut state, &mut wager).unwrap();
        assert_eq!(record.xp_gained, 0);
        assert_eq!(record.xp_lost, 0);
        assert!(record.ret_amount > 0.0);
    }

    #[test]
    fn draw_refunds_each_committed_stake() {
        let (ledger, mut state, mut wager) = fixtures(MatchType::Ranked, 100);
        state.winner = None;
        wager.stakes = [50, 50];
        wager.total_pool = 100;

        refund_draw(&ledger, &state, &mut wager).unwrap();

        let alice = ledger.snapshot("alice").unwrap();
        assert_eq!(alice.mana_balance, STARTING_MANA + 50.0);
        assert_eq!(alice.mana_history.len(), 1);
        assert_eq!(alice.mana_history[0].reason, "Draw stake refund");
        assert_eq!(wager.status, WagerStatus::Settled);
        assert_eq!(wager.winner, None);

        // A second refund attempt is rejected.
        let err = refund_draw(&ledger, &state, &mut wager).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidAction(_)));
    }
}
