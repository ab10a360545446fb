use crate::core::attendee::AttendeeId;
use crate::core::expense::{Expense, ExpenseId};
use crate::core::ledger::Ledger;
use crate::core::payment::Payment;
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// A set of attendees linked by open expenses and confirmed payments,
/// together with those records.
///
/// Every record touching an attendee of the component belongs to the
/// component, so the records contribute exactly each attendee's net
/// position. When all of those positions are zero the records can be
/// closed without disturbing anyone else's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementComponent {
    pub attendees: BTreeSet<AttendeeId>,
    pub expense_ids: Vec<ExpenseId>,
    pub payment_ids: Vec<Uuid>,
}

impl SettlementComponent {
    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    /// True when every attendee in the component nets to zero.
    pub fn is_balanced_in(&self, ledger: &Ledger) -> bool {
        self.attendees
            .iter()
            .all(|attendee| ledger.position(attendee).is_zero())
    }

    /// True when there is nothing to close.
    pub fn has_records(&self) -> bool {
        !self.expense_ids.is_empty() || !self.payment_ids.is_empty()
    }
}

/// Partition open expenses and confirmed payments into settlement components.
///
/// Uses union-find over attendees: an expense links its payer with every
/// opted-in participant, a payment links its two ends. Components are
/// returned ordered by their smallest attendee id; records inside keep
/// input order.
pub fn settlement_components(
    expenses: &[Expense],
    payments: &[Payment],
) -> Vec<SettlementComponent> {
    let open_expenses: Vec<&Expense> = expenses.iter().filter(|e| e.is_open()).collect();
    let confirmed: Vec<&Payment> = payments.iter().filter(|p| p.is_confirmed()).collect();

    let mut index: BTreeMap<AttendeeId, usize> = BTreeMap::new();
    let mut intern = |attendee: &AttendeeId| -> usize {
        let next = index.len();
        *index.entry(attendee.clone()).or_insert(next)
    };

    let expense_nodes: Vec<Vec<usize>> = open_expenses
        .iter()
        .map(|e| e.attendees().iter().map(&mut intern).collect())
        .collect();
    let payment_nodes: Vec<(usize, usize)> = confirmed
        .iter()
        .map(|p| (intern(&p.from_id), intern(&p.to_id)))
        .collect();

    let mut sets = UnionFind::<usize>::new(index.len());
    for nodes in &expense_nodes {
        if let Some((&first, rest)) = nodes.split_first() {
            for &other in rest {
                sets.union(first, other);
            }
        }
    }
    for &(from, to) in &payment_nodes {
        sets.union(from, to);
    }

    // root -> component; BTreeMap over attendees gives smallest-id-first order
    let mut by_root: BTreeMap<usize, SettlementComponent> = BTreeMap::new();
    let mut order: Vec<usize> = Vec::new();
    for (attendee, &node) in &index {
        let root = sets.find(node);
        by_root
            .entry(root)
            .or_insert_with(|| {
                order.push(root);
                SettlementComponent {
                    attendees: BTreeSet::new(),
                    expense_ids: Vec::new(),
                    payment_ids: Vec::new(),
                }
            })
            .attendees
            .insert(attendee.clone());
    }

    for (expense, nodes) in open_expenses.iter().zip(&expense_nodes) {
        if let Some(&first) = nodes.first() {
            if let Some(component) = by_root.get_mut(&sets.find(first)) {
                component.expense_ids.push(expense.id().clone());
            }
        }
    }
    for (payment, &(from, _)) in confirmed.iter().zip(&payment_nodes) {
        if let Some(component) = by_root.get_mut(&sets.find(from)) {
            component.payment_ids.push(payment.id);
        }
    }

    order
        .into_iter()
        .filter_map(|root| by_root.remove(&root))
        .collect()
}
