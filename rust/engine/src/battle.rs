//! Speed-ordered battle simulation for one round.
//!
//! All six card slots (three per side) attack in descending speed order.
//! An attacker strikes the opposing card at its own slot index; if that slot
//! is empty or already destroyed the damage lands on the defending player's
//! base. Damage is strict per-target: overkill clamps the defender to zero
//! and never spills into the base.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cards::{CardId, CardStats, SENTINEL_CARD_ID};

/// Starting per-round energy in round 1; grows by one each round.
pub const INITIAL_ENERGY: i32 = 8;
/// Starting base health; the match ends when a base reaches zero.
pub const INITIAL_BASE_HEALTH: i32 = 15;

/// A card as it exists during combat: catalog stats plus remaining health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatCard {
    pub id: CardId,
    pub hp: i32,
    pub atk: i32,
    pub spd: i32,
    pub egy: i32,
}

impl CombatCard {
    /// The empty-slot marker: contributes no actions and soaks no damage.
    pub fn sentinel() -> Self {
        Self {
            id: SENTINEL_CARD_ID,
            hp: 0,
            atk: 0,
            spd: 0,
            egy: 0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == SENTINEL_CARD_ID
    }

    pub fn from_stats(stats: &CardStats) -> Self {
        Self {
            id: stats.id,
            hp: stats.hp,
            atk: stats.atk,
            spd: stats.spd,
            egy: stats.egy,
        }
    }
}

/// Mutable per-player combat resources persisted across rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCombat {
    pub energy: i32,
    pub base_health: i32,
}

impl Default for PlayerCombat {
    fn default() -> Self {
        Self {
            energy: INITIAL_ENERGY,
            base_health: INITIAL_BASE_HEALTH,
        }
    }
}

/// One resolved attack, appended to the round's battle history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackEvent {
    /// Attacking player slot (0 or 1)
    pub attacker: usize,
    /// Defending player slot
    pub target: usize,
    /// Attacking card
    pub card: CardId,
    /// Defending card, `None` when the base was hit
    pub target_card: Option<CardId>,
    pub damage: i32,
    pub attacked_base: bool,
}

/// Result of simulating one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Every resolved attack, in execution order.
    pub history: Vec<AttackEvent>,
    /// Surviving cards per player and slot; destroyed slots hold the sentinel.
    pub remaining: [[CombatCard; 3]; 2],
    /// Player index whose opponent's base was destroyed mid-round, if any.
    pub winner: Option<usize>,
}

/// Derives the tie-break seed for a round. Equal-speed ordering must be
/// reproducible for auditability, so the coin flips come from a ChaCha20
/// stream keyed by the match id and round number.
pub fn tie_seed(match_id: &str, round: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(match_id.as_bytes());
    hasher.update(round.to_le_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().expect("digest is at least 8 bytes"))
}

/// Simulates one round of combat.
///
/// `cards[player][slot]` are the resolved selections with carried-over
/// health already applied; `stats` is mutated in place (base health only —
/// energy accounting happens before simulation). The walk stops as soon as
/// either base reaches zero.
pub fn simulate_round(
    cards: [[CombatCard; 3]; 2],
    stats: &mut [PlayerCombat; 2],
    seed: u64,
) -> RoundOutcome {
    let mut cards = cards;

    // Stable descending sort by speed, then one adjacent-pair pass where
    // each equal-speed pair is swapped on a seeded coin flip.
    let mut order: Vec<(usize, usize)> = (0..2)
        .flat_map(|side| (0..3).map(move |slot| (side, slot)))
        .collect();
    order.sort_by(|a, b| cards[b.0][b.1].spd.cmp(&cards[a.0][a.1].spd));
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    for i in 0..order.len() - 1 {
        let (a, b) = (order[i], order[i + 1]);
        if cards[a.0][a.1].spd == cards[b.0][b.1].spd && rng.random_bool(0.5) {
            order.swap(i, i + 1);
        }
    }

    let mut history = Vec::new();
    let mut winner = None;

    for (side, slot) in order {
        let attacker = cards[side][slot];
        // Sentinels never act; a card destroyed earlier this round is done.
        if attacker.is_sentinel() || attacker.hp <= 0 {
            continue;
        }
        let foe = 1 - side;
        let defender = cards[foe][slot];

        if defender.is_sentinel() || defender.hp <= 0 {
            stats[foe].base_health -= attacker.atk;
            history.push(AttackEvent {
                attacker: side,
                target: foe,
                card: attacker.id,
                target_card: None,
                damage: attacker.atk,
                attacked_base: true,
            });
        } else {
            let slot_card = &mut cards[foe][slot];
            if attacker.atk >= slot_card.hp {
                slot_card.hp = 0;
            } else {
                slot_card.hp -= attacker.atk;
            }
            history.push(AttackEvent {
                attacker: side,
                target: foe,
                card: attacker.id,
                target_card: Some(defender.id),
                damage: attacker.atk,
                attacked_base: false,
            });
        }

        if stats[0].base_health <= 0 || stats[1].base_health <= 0 {
            winner = Some(if stats[0].base_health > 0 { 0 } else { 1 });
            break;
        }
    }

    let remaining = cards.map(|side| {
        side.map(|card| {
            if card.is_sentinel() || card.hp <= 0 {
                CombatCard::sentinel()
            } else {
                card
            }
        })
    });

    RoundOutcome {
        history,
        remaining,
        winner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: CardId, hp: i32, atk: i32, spd: i32) -> CombatCard {
        CombatCard {
            id,
            hp,
            atk,
            spd,
            egy: 1,
        }
    }

    fn fresh_stats() -> [PlayerCombat; 2] {
        [PlayerCombat::default(), PlayerCombat::default()]
    }

    #[test]
    fn attacks_resolve_in_descending_speed_order() {
        let cards = [
            [card(1, 10, 1, 9), card(2, 10, 1, 5), card(3, 10, 1, 1)],
            [card(4, 10, 1, 8), card(5, 10, 1, 4), card(6, 10, 1, 2)],
        ];
        let mut stats = fresh_stats();
        let outcome = simulate_round(cards, &mut stats, 0);
        let attackers: Vec<CardId> = outcome.history.iter().map(|e| e.card).collect();
        assert_eq!(attackers, vec![1, 4, 2, 5, 6, 3]);
    }

    #[test]
    fn overkill_clamps_defender_and_spares_the_base() {
        let cards = [
            [card(1, 10, 9, 9), card(2, 10, 0, 1), card(3, 10, 0, 1)],
            [card(4, 2, 0, 1), card(5, 10, 0, 1), card(6, 10, 0, 1)],
        ];
        let mut stats = fresh_stats();
        let outcome = simulate_round(cards, &mut stats, 0);
        // Card 4 dies to 9 damage but the 7 excess never reaches the base.
        assert_eq!(stats[1].base_health, INITIAL_BASE_HEALTH);
        assert!(outcome.remaining[1][0].is_sentinel());
        let hit = &outcome.history[0];
        assert_eq!(hit.target_card, Some(4));
        assert!(!hit.attacked_base);
    }

    #[test]
    fn empty_slot_routes_damage_to_the_base() {
        let cards = [
            [card(1, 10, 3, 9), CombatCard::sentinel(), CombatCard::sentinel()],
            [
                CombatCard::sentinel(),
                CombatCard::sentinel(),
                CombatCard::sentinel(),
            ],
        ];
        let mut stats = fresh_stats();
        let outcome = simulate_round(cards, &mut stats, 0);
        assert_eq!(stats[1].base_health, INITIAL_BASE_HEALTH - 3);
        assert!(outcome.history[0].attacked_base);
        assert_eq!(outcome.history[0].target_card, None);
    }

    #[test]
    fn mixed_board_routes_undefended_slots_to_the_base() {
        let cards = [
            [card(1, 10, 5, 9), card(2, 10, 4, 3), CombatCard::sentinel()],
            [card(4, 3, 0, 1), CombatCard::sentinel(), CombatCard::sentinel()],
        ];
        let mut stats = fresh_stats();
        let outcome = simulate_round(cards, &mut stats, 0);
        // Card 1 destroys card 4 at slot 0; card 2 finds slot 1 undefended.
        assert!(outcome.remaining[1][0].is_sentinel());
        assert_eq!(stats[1].base_health, INITIAL_BASE_HEALTH - 4);
        let base_hits: Vec<_> = outcome
            .history
            .iter()
            .filter(|e| e.attacked_base)
            .collect();
        assert_eq!(base_hits.len(), 1);
        assert_eq!(base_hits[0].card, 2);
    }

    #[test]
    fn round_stops_the_moment_a_base_falls() {
        let cards = [
            [card(1, 10, 20, 9), card(2, 10, 20, 8), card(3, 10, 20, 7)],
            [
                CombatCard::sentinel(),
                CombatCard::sentinel(),
                CombatCard::sentinel(),
            ],
        ];
        let mut stats = fresh_stats();
        let outcome = simulate_round(cards, &mut stats, 0);
        // The first base hit already ends the match; no further attacks run.
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.winner, Some(0));
        assert!(stats[1].base_health <= 0);
    }

    #[test]
    fn simulation_is_deterministic_for_a_fixed_seed() {
        let cards = [
            [card(1, 10, 2, 5), card(2, 8, 3, 5), card(3, 6, 1, 5)],
            [card(4, 9, 2, 5), card(5, 7, 2, 5), card(6, 5, 3, 5)],
        ];
        let seed = tie_seed("match-abc", 3);
        let mut stats_a = fresh_stats();
        let mut stats_b = fresh_stats();
        let a = simulate_round(cards, &mut stats_a, seed);
        let b = simulate_round(cards, &mut stats_b, seed);
        assert_eq!(a, b);
        assert_eq!(stats_a, stats_b);
    }

    #[test]
    fn tie_seed_differs_across_rounds() {
        assert_ne!(tie_seed("match-abc", 1), tie_seed("match-abc", 2));
        assert_ne!(tie_seed("match-abc", 1), tie_seed("match-xyz", 1));
    }
}
