use crosstown_protocol::{
    DataId, FieldIndex, FieldKind, InvestmentKind, Money, MonopolyGroup, MonopolyId,
};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct InvestmentOption {
    pub kind: InvestmentKind,
    pub cost: Money,
    pub income: Money,
}

/// Static description of one cell. Shared by every game through [`Board`].
#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub index: FieldIndex,
    pub name: String,
    pub kind: FieldKind,
    pub country: Option<DataId>,
    pub industry: Option<DataId>,
    /// Tier 0 is the purchase; later tiers are upgrades.
    pub investments: Vec<InvestmentOption>,
}

impl FieldDefinition {
    pub fn is_firm(&self) -> bool {
        self.kind == FieldKind::Firm
    }

    /// Purchase price, counted toward liquidatable assets.
    pub fn base_cost(&self) -> Money {
        self.investments.first().map_or(0, |tier| tier.cost)
    }

    fn top_index(&self) -> Option<usize> {
        self.investments.len().checked_sub(1)
    }

    fn has_infinite_top(&self) -> bool {
        self.investments
            .last()
            .is_some_and(|tier| tier.kind == InvestmentKind::Infinite)
    }

    /// Tier applied at `level`; levels past the top only exist for an infinite top tier.
    pub fn tier(&self, level: u32) -> Option<&InvestmentOption> {
        let top = self.top_index()?;
        let level = level as usize;
        if level <= top {
            self.investments.get(level)
        } else if self.has_infinite_top() {
            self.investments.get(top)
        } else {
            None
        }
    }

    /// Tier an investment from `level` would buy.
    pub fn next_tier(&self, level: u32) -> Option<&InvestmentOption> {
        self.tier(level.saturating_add(1))
    }

    /// Income before monopoly multipliers. Every level at or past an infinite top tier adds its
    /// income once more.
    pub fn base_income(&self, level: u32) -> Money {
        let Some(top) = self.top_index() else {
            return 0;
        };
        let Some(tier) = self.tier(level) else {
            return 0;
        };
        if self.has_infinite_top() && level as usize >= top {
            let stacks = level as usize - top + 1;
            tier.income * stacks as Money
        } else {
            tier.income
        }
    }

    /// Sum of every cost paid to reach `level`, purchase included.
    pub fn invested_value(&self, level: u32) -> Money {
        (0..=level)
            .filter_map(|l| self.tier(l))
            .map(|tier| tier.cost)
            .sum()
    }
}

#[derive(Clone, Debug)]
pub struct Monopoly {
    pub id: MonopolyId,
    pub key: DataId,
    pub name: String,
    pub group: MonopolyGroup,
    pub members: Vec<FieldIndex>,
    pub multiplier: u32,
}

/// Compiled, immutable board: fields, monopoly sets and the field→sets index.
#[derive(Clone, Debug)]
pub struct Board {
    pub(crate) fields: Vec<FieldDefinition>,
    pub(crate) monopolies: Vec<Monopoly>,
    pub(crate) field_monopolies: Vec<Vec<MonopolyId>>,
}

impl Board {
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, index: FieldIndex) -> Option<&FieldDefinition> {
        self.fields.get(index.index())
    }

    pub fn monopolies(&self) -> &[Monopoly] {
        &self.monopolies
    }

    pub fn monopoly(&self, id: MonopolyId) -> Option<&Monopoly> {
        self.monopolies.get(id.index())
    }

    pub fn monopoly_by_key(&self, key: &str) -> Option<&Monopoly> {
        self.monopolies.iter().find(|m| m.key == key)
    }

    /// Sets containing `index`, in id order.
    pub fn monopolies_of(&self, index: FieldIndex) -> &[MonopolyId] {
        self.field_monopolies
            .get(index.index())
            .map_or(&[], Vec::as_slice)
    }

    pub fn firms(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.is_firm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firm(investments: Vec<InvestmentOption>) -> FieldDefinition {
        FieldDefinition {
            index: FieldIndex(1),
            name: "Test".into(),
            kind: FieldKind::Firm,
            country: None,
            industry: None,
            investments,
        }
    }

    fn tier(kind: InvestmentKind, cost: Money, income: Money) -> InvestmentOption {
        InvestmentOption { kind, cost, income }
    }

    #[test]
    fn regular_tiers_stop_at_top() {
        let def = firm(vec![
            tier(InvestmentKind::Regular, 1000, 100),
            tier(InvestmentKind::Regular, 500, 300),
        ]);
        assert_eq!(def.base_income(0), 100);
        assert_eq!(def.base_income(1), 300);
        assert!(def.next_tier(1).is_none());
        assert_eq!(def.invested_value(1), 1500);
    }

    #[test]
    fn infinite_top_stacks_income() {
        let def = firm(vec![
            tier(InvestmentKind::Regular, 1000, 100),
            tier(InvestmentKind::Infinite, 400, 250),
        ]);
        assert_eq!(def.base_income(1), 250);
        assert_eq!(def.base_income(3), 750);
        assert_eq!(def.next_tier(7).map(|t| t.cost), Some(400));
        assert_eq!(def.invested_value(3), 1000 + 400 * 3);
    }
}
