//! Resolves how many hierarchy levels a request must traverse.
//!
//! The resolution is stamped onto the request at creation and never
//! re-derived, so policy edits leave in-flight requests untouched.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::EntityKind;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTier {
    pub min_amount: Decimal,
    pub levels: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedLevels {
    pub levels: u8,
    pub entry_level: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelResolution {
    pub required_level: u8,
    pub entry_level: u8,
}

#[derive(Clone, Debug)]
pub struct LevelPolicy {
    tiers: Vec<LevelTier>,
    fixed: HashMap<EntityKind, FixedLevels>,
    max_levels: u8,
}

impl LevelPolicy {
    pub fn new(
        mut tiers: Vec<LevelTier>,
        fixed: HashMap<EntityKind, FixedLevels>,
        max_levels: u8,
    ) -> Self {
        tiers.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
        Self { tiers, fixed, max_levels }
    }

    pub fn max_levels(&self) -> u8 {
        self.max_levels
    }

    /// Picks the level requirement for a request being created.
    ///
    /// Order of precedence: a fixed per-kind policy, then the amount tier
    /// table, then the fail-safe ceiling. The fail-safe resolves to the
    /// maximum configured depth so an unconfigured kind is never waved
    /// through with fewer eyes than intended.
    pub fn resolve(&self, kind: EntityKind, amount: Option<Decimal>) -> LevelResolution {
        if let Some(fixed) = self.fixed.get(&kind) {
            return LevelResolution {
                required_level: fixed.levels,
                entry_level: fixed.entry_level,
            };
        }

        if let Some(amount) = amount {
            if let Some(levels) = self.tier_levels(amount) {
                return LevelResolution { required_level: levels, entry_level: 1 };
            }
        }

        LevelResolution { required_level: self.max_levels, entry_level: 1 }
    }

    fn tier_levels(&self, amount: Decimal) -> Option<u8> {
        let mut selected = None;
        for tier in &self.tiers {
            if tier.min_amount <= amount {
                selected = Some(tier.levels);
            } else {
                break;
            }
        }
        // Below the first tier: the smallest configured requirement applies.
        selected.or_else(|| self.tiers.first().map(|tier| tier.levels))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use super::{FixedLevels, LevelPolicy, LevelResolution, LevelTier};
    use crate::domain::request::EntityKind;

    fn policy() -> LevelPolicy {
        let tiers = vec![
            LevelTier { min_amount: Decimal::new(0, 0), levels: 1 },
            LevelTier { min_amount: Decimal::new(10_000, 0), levels: 2 },
            LevelTier { min_amount: Decimal::new(100_000, 0), levels: 3 },
        ];
        let mut fixed = HashMap::new();
        fixed.insert(EntityKind::Leave, FixedLevels { levels: 1, entry_level: 1 });
        fixed.insert(EntityKind::Transfer, FixedLevels { levels: 2, entry_level: 2 });
        LevelPolicy::new(tiers, fixed, 4)
    }

    #[test]
    fn amounts_map_to_tiers_with_inclusive_boundaries() {
        let policy = policy();
        let cases = [
            (Decimal::new(0, 0), 1),
            (Decimal::new(9_999, 0), 1),
            (Decimal::new(10_000, 0), 2),
            (Decimal::new(99_999, 0), 2),
            (Decimal::new(100_000, 0), 3),
            (Decimal::new(5_000_000, 0), 3),
        ];

        for (amount, expected) in cases {
            let resolved = policy.resolve(EntityKind::Expense, Some(amount));
            assert_eq!(
                resolved,
                LevelResolution { required_level: expected, entry_level: 1 },
                "amount {amount}"
            );
        }
    }

    #[test]
    fn higher_amounts_never_require_fewer_levels() {
        let policy = policy();
        let mut previous = 0;
        for amount in [0, 500, 10_000, 50_000, 100_000, 1_000_000] {
            let resolved = policy.resolve(EntityKind::Expense, Some(Decimal::new(amount, 0)));
            assert!(resolved.required_level >= previous, "amount {amount}");
            previous = resolved.required_level;
        }
    }

    #[test]
    fn fixed_kinds_ignore_the_amount() {
        let policy = policy();
        let leave = policy.resolve(EntityKind::Leave, Some(Decimal::new(1_000_000, 0)));
        assert_eq!(leave, LevelResolution { required_level: 1, entry_level: 1 });

        let transfer = policy.resolve(EntityKind::Transfer, None);
        assert_eq!(transfer, LevelResolution { required_level: 2, entry_level: 2 });
    }

    #[test]
    fn unconfigured_amountless_kind_falls_back_to_the_ceiling() {
        let policy = policy();
        let resolved = policy.resolve(EntityKind::Debt, None);
        assert_eq!(resolved, LevelResolution { required_level: 4, entry_level: 1 });
    }

    #[test]
    fn empty_tier_table_falls_back_to_the_ceiling() {
        let policy = LevelPolicy::new(Vec::new(), HashMap::new(), 3);
        let resolved = policy.resolve(EntityKind::Expense, Some(Decimal::new(50, 0)));
        assert_eq!(resolved, LevelResolution { required_level: 3, entry_level: 1 });
    }

    #[test]
    fn amount_below_the_first_tier_uses_the_first_tier() {
        let tiers = vec![LevelTier { min_amount: Decimal::new(1_000, 0), levels: 2 }];
        let policy = LevelPolicy::new(tiers, HashMap::new(), 5);
        let resolved = policy.resolve(EntityKind::Expense, Some(Decimal::new(10, 0)));
        assert_eq!(resolved, LevelResolution { required_level: 2, entry_level: 1 });
    }
}
