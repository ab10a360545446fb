use crate::core::attendee::AttendeeId;
use crate::core::money::Money;
use crate::graph::debt_graph::Debt;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single payment the optimizer asks the group to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementInstruction {
    pub from: AttendeeId,
    pub to: AttendeeId,
    pub amount_cents: Money,
    pub reason: String,
}

impl SettlementInstruction {
    pub fn new(from: AttendeeId, to: AttendeeId, amount: Money) -> Self {
        let reason = format!("Settlement: {} pays {} {}", from, to, amount);
        Self {
            from,
            to,
            amount_cents: amount,
            reason,
        }
    }
}

impl fmt::Display for SettlementInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("solver '{solver}' could not be initialised: {reason}")]
    Init { solver: String, reason: String },
    #[error("solver '{solver}' found no solution: {reason}")]
    NoSolution { solver: String, reason: String },
}

/// Strategy that turns a set of debts into settlement instructions.
///
/// Implementations may live in-process or behind a foreign boundary; the
/// optimizer verifies every result, so a solver only has to be correct,
/// not trusted.
pub trait SettlementSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, debts: &[Debt]) -> Result<Vec<SettlementInstruction>, SolverError>;
}

impl<S: SettlementSolver + ?Sized> SettlementSolver for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(&self, debts: &[Debt]) -> Result<Vec<SettlementInstruction>, SolverError> {
        (**self).solve(debts)
    }
}

impl<S: SettlementSolver + ?Sized> SettlementSolver for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(&self, debts: &[Debt]) -> Result<Vec<SettlementInstruction>, SolverError> {
        (**self).solve(debts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_reason() {
        let instruction = SettlementInstruction::new(
            AttendeeId::new("bob"),
            AttendeeId::new("alice"),
            Money::from_cents(2500),
        );
        assert_eq!(instruction.reason, "Settlement: bob pays alice $25.00");
        assert_eq!(instruction.to_string(), "bob -> alice: $25.00");
    }

    #[test]
    fn test_instruction_json_shape() {
        let instruction = SettlementInstruction::new(
            AttendeeId::new("b"),
            AttendeeId::new("a"),
            Money::from_cents(100),
        );
        let json = serde_json::to_value(&instruction).unwrap();
        assert_eq!(json["amountCents"], 100);
        assert_eq!(json["from"], "b");
    }
}
