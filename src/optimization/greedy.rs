use crate::core::attendee::AttendeeId;
use crate::core::ledger::Ledger;
use crate::core::money::Money;
use crate::graph::debt_graph::Debt;
use crate::optimization::solver::{SettlementInstruction, SettlementSolver, SolverError};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Largest-debtor / largest-creditor matching.
///
/// # Algorithm
///
/// 1. Collapse the debts into one net position per attendee.
/// 2. Split the non-zero positions into creditors and debtors.
/// 3. Pop the largest debtor and the largest creditor, transfer
///    `min(debt, credit)`, and push back whichever side has a remainder.
///
/// Every step fully settles at least one attendee, so the result has at
/// most `non-zero positions - 1` instructions. Equal magnitudes are taken
/// in ascending attendee id order, which makes the output reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySolver;

impl GreedySolver {
    pub fn new() -> Self {
        Self
    }

    /// Settle a ledger of net positions directly.
    pub fn settle_positions(ledger: &Ledger) -> Vec<SettlementInstruction> {
        // Max-heap on amount; Reverse on the id so the smaller id wins ties.
        let mut creditors: BinaryHeap<(Money, Reverse<AttendeeId>)> = BinaryHeap::new();
        let mut debtors: BinaryHeap<(Money, Reverse<AttendeeId>)> = BinaryHeap::new();

        for (attendee, position) in ledger.non_zero() {
            if position.is_positive() {
                creditors.push((position, Reverse(attendee.clone())));
            } else {
                debtors.push((position.abs(), Reverse(attendee.clone())));
            }
        }

        let mut instructions = Vec::with_capacity(creditors.len().max(debtors.len()));
        while let (Some((debt, Reverse(debtor))), Some((credit, Reverse(creditor)))) =
            (debtors.pop(), creditors.pop())
        {
            let amount = debt.min(credit);
            let debt_left = debt - amount;
            let credit_left = credit - amount;

            instructions.push(SettlementInstruction::new(
                debtor.clone(),
                creditor.clone(),
                amount,
            ));

            if debt_left.is_positive() {
                debtors.push((debt_left, Reverse(debtor)));
            }
            if credit_left.is_positive() {
                creditors.push((credit_left, Reverse(creditor)));
            }
        }

        instructions
    }
}

impl SettlementSolver for GreedySolver {
    fn name(&self) -> &str {
        "greedy"
    }

    fn solve(&self, debts: &[Debt]) -> Result<Vec<SettlementInstruction>, SolverError> {
        let mut ledger = Ledger::new();
        for debt in debts {
            ledger.apply_debt(&debt.debtor, &debt.creditor, debt.amount_cents);
        }

        if !ledger.is_balanced() {
            return Err(SolverError::NoSolution {
                solver: self.name().to_string(),
                reason: format!("positions sum to {}", ledger.imbalance()),
            });
        }

        Ok(Self::settle_positions(&ledger))
    }
}
