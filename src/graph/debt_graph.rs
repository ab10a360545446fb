use crate::balance::aggregator::PairwiseBalances;
use crate::core::attendee::AttendeeId;
use crate::core::expense::ExpenseId;
use crate::core::ledger::Ledger;
use crate::core::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A derived, strictly positive obligation from `debtor` to `creditor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub debtor: AttendeeId,
    pub creditor: AttendeeId,
    pub amount_cents: Money,
    /// Expenses that contributed to either direction of this pair.
    pub source_expense_ids: BTreeSet<ExpenseId>,
}

impl Debt {
    pub fn new(
        debtor: impl Into<AttendeeId>,
        creditor: impl Into<AttendeeId>,
        amount: Money,
    ) -> Self {
        Self {
            debtor: debtor.into(),
            creditor: creditor.into(),
            amount_cents: amount,
            source_expense_ids: BTreeSet::new(),
        }
    }
}

/// Canonical debtor → creditor edges for a group.
///
/// At most one edge per unordered pair, no self-edges, no zero edges.
/// Edges are ordered by `(debtor, creditor)`.
///
/// # Examples
///
/// ```
/// use settlement_engine::balance::aggregator::BalanceAggregator;
/// use settlement_engine::core::expense::Expense;
/// use settlement_engine::core::money::Money;
/// use settlement_engine::graph::debt_graph::DebtGraph;
///
/// let expenses = vec![
///     Expense::new("e1", "alice", Money::from_cents(10000)).split_evenly(["alice", "bob"]),
///     Expense::new("e2", "bob", Money::from_cents(5000)).split_evenly(["alice", "bob"]),
/// ];
/// let balances = BalanceAggregator::default().aggregate(&expenses, &[]).unwrap();
/// let graph = DebtGraph::from_balances(&balances);
///
/// assert_eq!(graph.edge_count(), 1);
/// assert_eq!(graph.debts()[0].amount_cents, Money::from_cents(2500));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtGraph {
    debts: Vec<Debt>,
}

impl DebtGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Net the directed buckets of every unordered pair into one edge.
    pub fn from_balances(balances: &PairwiseBalances) -> Self {
        Self::net_pairs(balances.buckets().iter().map(|((debtor, creditor), bucket)| {
            (
                debtor.clone(),
                creditor.clone(),
                bucket.amount(),
                bucket.expense_ids.clone(),
            )
        }))
    }

    /// Build a canonical graph from arbitrary debts, netting duplicates and
    /// opposite directions.
    pub fn from_debts(debts: impl IntoIterator<Item = Debt>) -> Self {
        Self::net_pairs(debts.into_iter().map(|d| {
            (d.debtor, d.creditor, d.amount_cents, d.source_expense_ids)
        }))
    }

    fn net_pairs(
        entries: impl Iterator<Item = (AttendeeId, AttendeeId, Money, BTreeSet<ExpenseId>)>,
    ) -> Self {
        let mut pairs: BTreeMap<(AttendeeId, AttendeeId), (Money, BTreeSet<ExpenseId>)> =
            BTreeMap::new();

        for (debtor, creditor, amount, expense_ids) in entries {
            if debtor == creditor {
                continue;
            }
            // Key on (low, high) and sign the amount as "low owes high"
            let (key, signed) = if debtor < creditor {
                ((debtor, creditor), amount)
            } else {
                ((creditor, debtor), -amount)
            };
            let entry = pairs.entry(key).or_default();
            entry.0 += signed;
            entry.1.extend(expense_ids);
        }

        // BTreeMap order on (low, high) is not (debtor, creditor) order once
        // edges flip, so sort explicitly.
        let mut debts: Vec<Debt> = pairs
            .into_iter()
            .filter(|(_, (net, _))| !net.is_zero())
            .map(|((low, high), (net, expense_ids))| {
                let (debtor, creditor) = if net.is_positive() { (low, high) } else { (high, low) };
                Debt {
                    debtor,
                    creditor,
                    amount_cents: net.abs(),
                    source_expense_ids: expense_ids,
                }
            })
            .collect();
        debts.sort_by(|a, b| (&a.debtor, &a.creditor).cmp(&(&b.debtor, &b.creditor)));

        Self { debts }
    }

    pub fn debts(&self) -> &[Debt] {
        &self.debts
    }

    pub fn edge_count(&self) -> usize {
        self.debts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.debts.is_empty()
    }

    /// Every attendee appearing on an edge, sorted.
    pub fn attendees(&self) -> BTreeSet<&AttendeeId> {
        self.debts
            .iter()
            .flat_map(|d| [&d.debtor, &d.creditor])
            .collect()
    }

    /// Sum of all edge amounts.
    pub fn gross_total(&self) -> Money {
        self.debts.iter().map(|d| d.amount_cents).sum()
    }

    /// Get the amount `debtor` owes `creditor` on this graph (zero if no edge).
    pub fn edge_amount(&self, debtor: &AttendeeId, creditor: &AttendeeId) -> Money {
        self.debts
            .iter()
            .find(|d| &d.debtor == debtor && &d.creditor == creditor)
            .map(|d| d.amount_cents)
            .unwrap_or_default()
    }

    /// Collapse the edges into one net position per attendee.
    pub fn net_positions(&self) -> Ledger {
        let mut ledger = Ledger::new();
        for debt in &self.debts {
            ledger.apply_debt(&debt.debtor, &debt.creditor, debt.amount_cents);
        }
        ledger
    }

    /// Union of the source expenses of every edge.
    pub fn source_expense_ids(&self) -> BTreeSet<&ExpenseId> {
        self.debts
            .iter()
            .flat_map(|d| d.source_expense_ids.iter())
            .collect()
    }
}
