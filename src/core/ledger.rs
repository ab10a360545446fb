use crate::core::attendee::AttendeeId;
use crate::core::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tracks the net position of each attendee.
///
/// A positive balance means the attendee is owed (net creditor).
/// A negative balance means the attendee owes (net debtor).
///
/// Positions are kept in a `BTreeMap` so iteration is ordered by attendee
/// id, which keeps every downstream computation reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    positions: BTreeMap<AttendeeId, Money>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `debtor` owes `creditor` `amount`: debtor loses, creditor gains.
    pub fn apply_debt(&mut self, debtor: &AttendeeId, creditor: &AttendeeId, amount: Money) {
        *self.positions.entry(debtor.clone()).or_default() -= amount;
        *self.positions.entry(creditor.clone()).or_default() += amount;
    }

    /// Record a transfer of `amount` from `from` to `to`; the inverse of a debt.
    pub fn apply_transfer(&mut self, from: &AttendeeId, to: &AttendeeId, amount: Money) {
        self.apply_debt(to, from, amount);
    }

    /// Make sure `attendee` has an entry, even if it stays at zero.
    pub fn touch(&mut self, attendee: &AttendeeId) {
        self.positions.entry(attendee.clone()).or_default();
    }

    /// Net position of an attendee (zero if unknown).
    pub fn position(&self, attendee: &AttendeeId) -> Money {
        self.positions.get(attendee).copied().unwrap_or_default()
    }

    /// Mutable access to an attendee's position, inserting zero if absent.
    pub fn position_mut(&mut self, attendee: &AttendeeId) -> &mut Money {
        self.positions.entry(attendee.clone()).or_default()
    }

    /// All positions, zero entries included, ordered by attendee id.
    pub fn all_positions(&self) -> &BTreeMap<AttendeeId, Money> {
        &self.positions
    }

    /// Iterate over the non-zero positions in attendee order.
    pub fn non_zero(&self) -> impl Iterator<Item = (&AttendeeId, Money)> {
        self.positions
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(id, &amount)| (id, amount))
    }

    pub fn non_zero_count(&self) -> usize {
        self.non_zero().count()
    }

    /// Sum of every position. Zero for any closed group.
    pub fn imbalance(&self) -> Money {
        self.positions.values().sum()
    }

    /// Verify that the ledger is balanced: the sum of all positions is zero.
    pub fn is_balanced(&self) -> bool {
        self.imbalance().is_zero()
    }

    /// True when every attendee is at zero.
    pub fn is_settled(&self) -> bool {
        self.positions.values().all(|amount| amount.is_zero())
    }

    /// Sum of positive positions (equal to the sum of |negative| ones when balanced).
    /// This is the total amount that actually needs to move.
    pub fn total_net_settlement(&self) -> Money {
        self.positions
            .values()
            .filter(|amount| amount.is_positive())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AttendeeId {
        AttendeeId::new(s)
    }

    #[test]
    fn test_ledger_basic() {
        let mut ledger = Ledger::new();
        ledger.apply_debt(&id("bob"), &id("alice"), Money::from_cents(100));

        assert_eq!(ledger.position(&id("bob")), Money::from_cents(-100));
        assert_eq!(ledger.position(&id("alice")), Money::from_cents(100));
        assert!(ledger.is_balanced());
    }

    #[test]
    fn test_transfer_cancels_debt() {
        let mut ledger = Ledger::new();
        ledger.apply_debt(&id("bob"), &id("alice"), Money::from_cents(100));
        ledger.apply_transfer(&id("bob"), &id("alice"), Money::from_cents(100));

        assert!(ledger.is_settled());
        assert_eq!(ledger.non_zero_count(), 0);
    }

    #[test]
    fn test_ledger_circular_cancels() {
        let mut ledger = Ledger::new();
        ledger.apply_debt(&id("a"), &id("b"), Money::from_cents(100));
        ledger.apply_debt(&id("b"), &id("c"), Money::from_cents(100));
        ledger.apply_debt(&id("c"), &id("a"), Money::from_cents(100));

        // Perfect cycle: everyone's net position is zero
        assert_eq!(ledger.position(&id("a")), Money::ZERO);
        assert_eq!(ledger.total_net_settlement(), Money::ZERO);
    }

    #[test]
    fn test_total_net_settlement() {
        let mut ledger = Ledger::new();
        ledger.apply_debt(&id("a"), &id("b"), Money::from_cents(100));
        ledger.apply_debt(&id("b"), &id("c"), Money::from_cents(60));
        ledger.apply_debt(&id("c"), &id("a"), Money::from_cents(30));

        // a: -70, b: +40, c: +30
        assert_eq!(ledger.total_net_settlement(), Money::from_cents(70));
        assert_eq!(ledger.non_zero_count(), 3);
    }

    #[test]
    fn test_touch_keeps_zero_entry() {
        let mut ledger = Ledger::new();
        ledger.touch(&id("zoe"));
        assert_eq!(ledger.all_positions().len(), 1);
        assert!(ledger.is_settled());
    }
}
