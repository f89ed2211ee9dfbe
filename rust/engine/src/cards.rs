use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of a card in the static catalog.
pub type CardId = u32;

/// Reserved id meaning "empty slot": a destroyed card, or no card at all.
/// The sentinel never appears in the catalog and contributes no actions.
pub const SENTINEL_CARD_ID: CardId = 999;

/// Static combat stats for one card, as published by the card catalog.
/// `hp` is the printed health; residual health during a match is tracked
/// separately on [`crate::battle::CombatCard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
    /// Catalog id
    pub id: CardId,
    /// Display name
    pub name: String,
    /// Printed health
    pub hp: i32,
    /// Attack value
    pub atk: i32,
    /// Speed, used to order attackers within a round
    pub spd: i32,
    /// Energy cost to play the card
    pub egy: i32,
    /// Rarity bucket
    pub rarity: String,
}

/// Read-only lookup of static card stats. The catalog is an external
/// collaborator; the engine never mutates it.
pub trait CardCatalog {
    /// Returns the stats for `id`, or `None` for unknown ids.
    /// The sentinel id is not a catalog entry and returns `None`.
    fn stats(&self, id: CardId) -> Option<CardStats>;
}

/// In-memory catalog backed by a `HashMap`. Suitable for tests and for
/// callers that load the card set up front.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    cards: HashMap<CardId, CardStats>,
}

impl StaticCatalog {
    pub fn new(cards: Vec<CardStats>) -> Self {
        Self {
            cards: cards.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl CardCatalog for StaticCatalog {
    fn stats(&self, id: CardId) -> Option<CardStats> {
        self.cards.get(&id).cloned()
    }
}
