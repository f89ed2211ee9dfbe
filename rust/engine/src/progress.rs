//! Round progression and win-condition handling.
//!
//! A round moves through commit → reveal → simulate. [`record_reveal`]
//! verifies a reveal against its commitment and stores it;
//! [`resolve_round`] runs once both players have revealed, validating
//! carry-over, charging energy, simulating combat, and deciding whether the
//! match is over.

use crate::battle::{simulate_round, tie_seed, CombatCard, INITIAL_ENERGY};
use crate::cards::{CardCatalog, CardId, SENTINEL_CARD_ID};
use crate::commit::verify_selection;
use crate::errors::EngineError;
use crate::state::{MatchState, MatchStatus, MAX_ROUNDS};

/// Energy available to each player in a given round.
pub fn energy_budget(round: u32) -> i32 {
    INITIAL_ENERGY + round as i32 - 1
}

/// What resolving a round decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundResolution {
    /// A base fell mid-round, or the round cap resolved on base health.
    WinnerFound { winner: String, loser: String },
    /// Round cap reached with equal base health; the match is a draw.
    Draw,
    /// No win condition met; the match continues at `round`.
    RoundAdvanced { round: u32 },
}

/// Verifies a revealed triple against the player's stored commitment for
/// the current round and records it. Returns `true` once both players have
/// revealed, which is the caller's trigger to [`resolve_round`].
///
/// Rejections (`MatchNotActive`, `CommitmentMissing`,
/// `CardVerificationFailed`, `AlreadyRevealed`) leave state unchanged.
pub fn record_reveal(
    state: &mut MatchState,
    player: &str,
    cards: [CardId; 3],
) -> Result<bool, EngineError> {
    if !state.status.accepts_play() {
        return Err(EngineError::MatchNotActive);
    }
    let idx = state
        .player_index(player)
        .ok_or_else(|| EngineError::UnknownPlayer {
            player: player.to_string(),
        })?;
    let round = state.round;
    let commitment = state
        .commitment(round, idx)
        .ok_or_else(|| EngineError::CommitmentMissing {
            player: player.to_string(),
            round,
        })?;
    if !verify_selection(commitment, &cards) {
        return Err(EngineError::CardVerificationFailed {
            player: player.to_string(),
        });
    }
    let entry = state.cards_played.entry(round).or_default();
    if entry[idx].is_some() {
        return Err(EngineError::AlreadyRevealed {
            player: player.to_string(),
            round,
        });
    }
    entry[idx] = Some(cards);
    Ok(entry.iter().all(|sel| sel.is_some()))
}

/// Resolves the current round once both players have revealed.
///
/// Consumes the round's selections exactly once: history, remaining cards,
/// and player stats are written, and either a winner is declared or the
/// round counter advances (the wager ladder resets in the latter case,
/// driven by the caller).
///
/// An over-budget energy spend rolls back the offending player's reveal so
/// they can resubmit, and surfaces `EnergyExceeded` instead of silently
/// dropping the round.
pub fn resolve_round(
    state: &mut MatchState,
    catalog: &dyn CardCatalog,
) -> Result<RoundResolution, EngineError> {
    if !state.status.accepts_play() {
        return Err(EngineError::MatchNotActive);
    }
    let round = state.round;
    let selections = *state
        .cards_played
        .get(&round)
        .ok_or(EngineError::RoundNotReady { round })?;
    let revealed = match selections {
        [Some(a), Some(b)] => [a, b],
        _ => return Err(EngineError::RoundNotReady { round }),
    };

    let previous = if round > 1 {
        state.remaining_cards.get(&(round - 1)).copied()
    } else {
        None
    };

    // A card that survived the previous round must reappear unchanged at
    // the same slot index.
    if let Some(prev) = previous {
        for idx in 0..2 {
            for pos in 0..3 {
                let survivor = prev[idx][pos];
                if !survivor.is_sentinel() && survivor.id != revealed[idx][pos] {
                    return Err(EngineError::CardMismatch {
                        player: state.players[idx].clone(),
                        position: pos,
                    });
                }
            }
        }
    }

    let budget = energy_budget(round);

    // Resolve selections against the catalog, carrying residual health
    // forward for survivors.
    let mut cards = [[CombatCard::sentinel(); 3]; 2];
    for idx in 0..2 {
        for pos in 0..3 {
            let id = revealed[idx][pos];
            if id == SENTINEL_CARD_ID {
                continue;
            }
            let stats = catalog.stats(id).ok_or(EngineError::UnknownCard(id))?;
            let mut card = CombatCard::from_stats(&stats);
            if let Some(prev) = previous {
                let survivor = prev[idx][pos];
                if survivor.id == id {
                    card.hp = survivor.hp;
                }
            }
            cards[idx][pos] = card;
        }
    }

    // Charge energy, rolling back any over-budget reveal.
    let mut exceeded: Option<EngineError> = None;
    for idx in 0..2 {
        let cost: i32 = cards[idx]
            .iter()
            .filter(|c| !c.is_sentinel())
            .map(|c| c.egy)
            .sum();
        if cost > budget {
            // Roll back the reveal and its commitment so the player can
            // commit and reveal an affordable selection.
            if let Some(entry) = state.cards_played.get_mut(&round) {
                entry[idx] = None;
            }
            if let Some(entry) = state.card_hashes.get_mut(&round) {
                entry[idx] = None;
            }
            if exceeded.is_none() {
                exceeded = Some(EngineError::EnergyExceeded {
                    player: state.players[idx].clone(),
                    required: cost,
                    available: budget,
                });
            }
        }
    }
    if let Some(err) = exceeded {
        return Err(err);
    }
    for idx in 0..2 {
        let cost: i32 = cards[idx]
            .iter()
            .filter(|c| !c.is_sentinel())
            .map(|c| c.egy)
            .sum();
        state.stats[idx].energy = budget - cost;
    }

    let seed = tie_seed(&state.match_id, round);
    let outcome = simulate_round(cards, &mut state.stats, seed);
    state.battle_history.insert(round, outcome.history);
    state.remaining_cards.insert(round, outcome.remaining);

    if let Some(w) = outcome.winner {
        let winner = state.players[w].clone();
        let loser = state.players[1 - w].clone();
        state.set_status(MatchStatus::Completed)?;
        state.winner = Some(winner.clone());
        return Ok(RoundResolution::WinnerFound { winner, loser });
    }

    if round >= MAX_ROUNDS {
        let [h0, h1] = [state.stats[0].base_health, state.stats[1].base_health];
        if h0 == h1 {
            state.set_status(MatchStatus::Completed)?;
            return Ok(RoundResolution::Draw);
        }
        let w = if h0 > h1 { 0 } else { 1 };
        let winner = state.players[w].clone();
        let loser = state.players[1 - w].clone();
        state.set_status(MatchStatus::Completed)?;
        state.winner = Some(winner.clone());
        return Ok(RoundResolution::WinnerFound { winner, loser });
    }

    state.round += 1;
    Ok(RoundResolution::RoundAdvanced { round: state.round })
}
