//! Rank-tier → RET payout lookup, read-only at match-resolution time.

use std::collections::HashMap;

use crate::errors::ArenaError;

/// Normalizes a tier string for lookup: case-folded, whitespace stripped,
/// so "Rookie 1" and "rookie1" hit the same row.
pub fn normalize_tier(rank: &str) -> String {
    rank.to_lowercase().split_whitespace().collect()
}

/// Payout table keyed by normalized rank tier.
#[derive(Debug, Clone)]
pub struct RewardTable {
    rewards: HashMap<String, f64>,
}

impl RewardTable {
    pub fn new(rewards: HashMap<String, f64>) -> Self {
        Self {
            rewards: rewards
                .into_iter()
                .map(|(tier, amount)| (normalize_tier(&tier), amount))
                .collect(),
        }
    }

    /// Looks up the payout for a rank tier.
    ///
    /// An entirely empty table means the reward configuration is missing,
    /// which aborts the whole settlement attempt; a present table without
    /// the requested row fails with the tier named.
    pub fn lookup(&self, rank: &str) -> Result<f64, ArenaError> {
        if self.rewards.is_empty() {
            return Err(ArenaError::RewardConfigMissing(String::new()));
        }
        let tier = normalize_tier(rank);
        self.rewards
            .get(&tier)
            .copied()
            .ok_or(ArenaError::RewardConfigMissing(tier))
    }
}

impl Default for RewardTable {
    /// The production payout curve, one row per rank tier.
    fn default() -> Self {
        let rows: [(&str, f64); 25] = [
            ("rookie1", 14.784372086975955),
            ("rookie2", 29.56874417395191),
            ("rookie3", 44.80112753629077),
            ("adept1", 59.585499623266735),
            ("adept2", 74.36987171024268),
            ("adept3", 89.60225507258154),
            ("expert1", 104.3866271595575),
            ("expert2", 119.17099924653347),
            ("expert3", 134.40338260887233),
            ("master1", 149.18775469584827),
            ("master2", 163.97212678282423),
            ("master3", 179.20451014516308),
            ("grandmaster1", 193.98888223213905),
            ("grandmaster2", 208.773254319115),
            ("grandmaster3", 224.0056376814539),
            ("champion1", 238.7900097684298),
            ("champion2", 253.57438185540576),
            ("champion3", 268.80676521774467),
            ("legend1", 283.59113730472063),
            ("legend2", 298.37550939169654),
            ("legend3", 313.6078927540354),
            ("myth1", 328.39226484101135),
            ("myth2", 343.17663692798726),
            ("myth3", 358.40902029032617),
            ("transcendent", 448.0112753629078),
        ];
        Self {
            rewards: rows
                .into_iter()
                .map(|(tier, amount)| (tier.to_string(), amount))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_normalizes_case_and_whitespace() {
        let table = RewardTable::default();
        let direct = table.lookup("rookie1").unwrap();
        assert_eq!(table.lookup("Rookie 1").unwrap(), direct);
        assert_eq!(table.lookup("ROOKIE1").unwrap(), direct);
    }

    #[test]
    fn unknown_tier_names_the_tier() {
        let table = RewardTable::default();
        let err = table.lookup("Cosmic 9").unwrap_err();
        assert_eq!(err, ArenaError::RewardConfigMissing("cosmic9".to_string()));
    }

    #[test]
    fn empty_table_is_a_missing_configuration() {
        let table = RewardTable::new(HashMap::new());
        let err = table.lookup("rookie1").unwrap_err();
        assert_eq!(err, ArenaError::RewardConfigMissing(String::new()));
    }

    #[test]
    fn custom_tables_normalize_their_keys() {
        let table = RewardTable::new(HashMap::from([("Rookie 1".to_string(), 5.0)]));
        assert_eq!(table.lookup("rookie1").unwrap(), 5.0);
    }
}
