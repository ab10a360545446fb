use crate::core::ledger::Ledger;
use crate::core::money::Money;
use crate::error::{EngineError, ImbalanceError};
use crate::graph::debt_graph::DebtGraph;
use crate::optimization::greedy::GreedySolver;
use crate::optimization::solver::{SettlementInstruction, SettlementSolver};
use log::{debug, error};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

const STAGE: &str = "optimization";

/// Verified output of the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    instructions: Vec<SettlementInstruction>,
    /// Debt edges before optimization.
    original_count: usize,
    optimized_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    savings_percent: Decimal,
}

impl SettlementPlan {
    fn new(instructions: Vec<SettlementInstruction>, original_count: usize) -> Self {
        let optimized_count = instructions.len();
        Self {
            instructions,
            original_count,
            optimized_count,
            savings_percent: savings_percent(original_count, optimized_count),
        }
    }

    pub fn instructions(&self) -> &[SettlementInstruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<SettlementInstruction> {
        self.instructions
    }

    pub fn original_count(&self) -> usize {
        self.original_count
    }

    pub fn optimized_count(&self) -> usize {
        self.optimized_count
    }

    /// Reduction in transaction count relative to the debt edges, rounded
    /// to one decimal place. Zero when there were no edges.
    pub fn savings_percent(&self) -> Decimal {
        self.savings_percent
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Total amount the plan moves.
    pub fn total_moved(&self) -> Money {
        self.instructions.iter().map(|i| i.amount_cents).sum()
    }
}

impl fmt::Display for SettlementPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Settlement Plan ===")?;
        writeln!(f, "Debts:        {}", self.original_count)?;
        writeln!(f, "Payments:     {}", self.optimized_count)?;
        writeln!(f, "Savings:      {}%", self.savings_percent)?;
        writeln!(f, "Total moved:  {}", self.total_moved())?;

        if !self.instructions.is_empty() {
            writeln!(f, "\nInstructions:")?;
            for instruction in &self.instructions {
                writeln!(f, "  {}", instruction)?;
            }
        }
        Ok(())
    }
}

fn savings_percent(original: usize, optimized: usize) -> Decimal {
    if original == 0 {
        return Decimal::ZERO;
    }
    let saved = Decimal::from(original as i64 - optimized as i64);
    (saved * Decimal::from(100) / Decimal::from(original as i64)).round_dp(1)
}

/// Runs a [`SettlementSolver`] and checks its output against the debt graph.
///
/// The solver is never trusted: the optimizer rejects any result that does
/// not reproduce every attendee's net position exactly, moves more than the
/// minimum total, or contains a non-positive or self-directed instruction.
/// Such a result is a bug and surfaces as [`ImbalanceError`].
///
/// # Examples
///
/// ```
/// use settlement_engine::graph::debt_graph::{Debt, DebtGraph};
/// use settlement_engine::core::money::Money;
/// use settlement_engine::optimization::optimizer::SettlementOptimizer;
///
/// let graph = DebtGraph::from_debts(vec![
///     Debt::new("a", "b", Money::from_cents(1000)),
///     Debt::new("b", "c", Money::from_cents(1000)),
/// ]);
/// let plan = SettlementOptimizer::default().optimize(&graph).unwrap();
///
/// assert_eq!(plan.original_count(), 2);
/// assert_eq!(plan.optimized_count(), 1);
/// assert_eq!(plan.savings_percent(), rust_decimal::Decimal::from(50));
/// ```
#[derive(Clone)]
pub struct SettlementOptimizer {
    solver: Arc<dyn SettlementSolver>,
}

impl Default for SettlementOptimizer {
    fn default() -> Self {
        Self::new(Arc::new(GreedySolver))
    }
}

impl fmt::Debug for SettlementOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementOptimizer")
            .field("solver", &self.solver.name())
            .finish()
    }
}

impl SettlementOptimizer {
    pub fn new(solver: Arc<dyn SettlementSolver>) -> Self {
        Self { solver }
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    pub fn optimize(&self, graph: &DebtGraph) -> Result<SettlementPlan, EngineError> {
        let positions = graph.net_positions();
        if !positions.is_balanced() {
            let err = ImbalanceError::NonZeroSum {
                stage: STAGE,
                sum: positions.imbalance(),
            };
            error!("{}", err);
            return Err(err.into());
        }

        if graph.is_empty() {
            return Ok(SettlementPlan::new(Vec::new(), 0));
        }

        let instructions = self.solver.solve(graph.debts())?;
        verify(&positions, &instructions).map_err(|err| {
            error!("solver '{}' produced an invalid plan: {}", self.solver.name(), err);
            err
        })?;

        let plan = SettlementPlan::new(instructions, graph.edge_count());
        debug!(
            "solver '{}' reduced {} debts to {} payments ({}%)",
            self.solver.name(),
            plan.original_count,
            plan.optimized_count,
            plan.savings_percent
        );
        Ok(plan)
    }
}

fn verify(
    positions: &Ledger,
    instructions: &[SettlementInstruction],
) -> Result<(), ImbalanceError> {
    // The flows a plan produces must equal the positions it settles: a
    // debtor at -x pays out exactly x net, a creditor at +y receives y.
    let mut flows = Ledger::new();
    for instruction in instructions {
        if !instruction.amount_cents.is_positive() || instruction.from == instruction.to {
            return Err(ImbalanceError::InvalidInstruction {
                stage: STAGE,
                from: instruction.from.clone(),
                to: instruction.to.clone(),
                amount: instruction.amount_cents,
            });
        }
        flows.apply_debt(&instruction.from, &instruction.to, instruction.amount_cents);
    }

    let attendees: BTreeSet<_> = positions
        .all_positions()
        .keys()
        .chain(flows.all_positions().keys())
        .collect();
    for attendee in attendees {
        let expected = positions.position(attendee);
        let actual = flows.position(attendee);
        if expected != actual {
            return Err(ImbalanceError::PositionMismatch {
                stage: STAGE,
                attendee: attendee.clone(),
                expected,
                actual,
            });
        }
    }

    let moved: Money = instructions.iter().map(|i| i.amount_cents).sum();
    let required = positions.total_net_settlement();
    if moved != required {
        return Err(ImbalanceError::TotalMismatch {
            stage: STAGE,
            moved,
            required,
        });
    }

    Ok(())
}
