use crate::balance::aggregator::{BalanceAggregator, PairwiseBalances};
use crate::config::EngineConfig;
use crate::core::attendee::GroupId;
use crate::core::expense::ExpenseId;
use crate::core::payment::{NewPayment, PaymentMethod};
use crate::error::EngineError;
use crate::execution::store::{SettlementStore, StoreError};
use crate::graph::components::settlement_components;
use crate::graph::debt_graph::DebtGraph;
use crate::optimization::optimizer::{SettlementOptimizer, SettlementPlan};
use crate::optimization::solver::SettlementInstruction;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Outcome of a completed settlement run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub payments_created: usize,
    pub expenses_settled: usize,
    pub payments_reconciled: usize,
    pub instructions: Vec<SettlementInstruction>,
    /// Expenses whose shares produced the debts this run paid off.
    pub attributed_expenses: Vec<ExpenseId>,
}

/// Why a run stopped before applying every instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("execution deadline of {limit:?} exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration, limit: Duration },
}

/// A run that stopped part-way.
///
/// Applied writes stay applied. Running the executor again recomputes the
/// plan from what was persisted and finishes the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "settlement stopped after {} of {} instructions: {source}",
    .applied.len(),
    .applied.len() + .unapplied.len()
)]
pub struct PartialSettlement {
    pub applied: Vec<SettlementInstruction>,
    pub unapplied: Vec<SettlementInstruction>,
    pub payments_created: usize,
    pub expenses_settled: usize,
    pub payments_reconciled: usize,
    #[source]
    pub source: ExecutionFailure,
}

/// Balances, debt graph and plan for a group at one point in time.
#[derive(Debug, Clone)]
pub struct PlannedSettlement {
    pub balances: PairwiseBalances,
    pub graph: DebtGraph,
    pub plan: SettlementPlan,
}

#[derive(Debug, Default)]
struct Progress {
    payments_created: usize,
    expenses_settled: usize,
    payments_reconciled: usize,
}

/// Applies a settlement plan to the store.
#[derive(Debug, Clone)]
pub struct SettlementExecutor {
    aggregator: BalanceAggregator,
    optimizer: SettlementOptimizer,
    payment_method: PaymentMethod,
    timeout: Option<Duration>,
}

impl Default for SettlementExecutor {
    fn default() -> Self {
        Self::new(SettlementOptimizer::default(), &EngineConfig::default())
    }
}

impl SettlementExecutor {
    pub fn new(optimizer: SettlementOptimizer, config: &EngineConfig) -> Self {
        Self {
            aggregator: BalanceAggregator::new(config.overpayment_policy),
            optimizer,
            payment_method: config.payment_method,
            timeout: config.execution_timeout(),
        }
    }

    pub fn optimizer(&self) -> &SettlementOptimizer {
        &self.optimizer
    }

    /// Compute the current plan for a group without writing anything.
    pub fn plan<S>(&self, store: &S, group: &GroupId) -> Result<PlannedSettlement, EngineError>
    where
        S: SettlementStore + ?Sized,
    {
        let expenses = store.list_open_expenses(group)?;
        let payments = store.list_confirmed_payments(group)?;

        let balances = self.aggregator.aggregate(&expenses, &payments)?;
        let graph = DebtGraph::from_balances(&balances);
        let plan = self.optimizer.optimize(&graph)?;
        debug!(
            "group {}: {} open expenses, {} payments, {} debts, {} instructions",
            group,
            expenses.len(),
            payments.len(),
            graph.edge_count(),
            plan.optimized_count()
        );

        Ok(PlannedSettlement {
            balances,
            graph,
            plan,
        })
    }

    /// Settle a group.
    ///
    /// The plan is always recomputed from the store, so a stale or repeated
    /// request cannot pay twice. Instructions are applied in order; after
    /// each payment (and once before the first) every settlement component
    /// that nets to zero is closed. A store failure or deadline stops the run
    /// with [`PartialSettlement`]; nothing is rolled back.
    pub fn execute<S>(&self, store: &S, group: &GroupId) -> Result<ExecutionReport, EngineError>
    where
        S: SettlementStore + ?Sized,
    {
        let started = Instant::now();
        let planned = self.plan(store, group)?;
        let attributed_expenses: Vec<ExpenseId> = planned
            .graph
            .source_expense_ids()
            .into_iter()
            .cloned()
            .collect();
        let instructions = planned.plan.into_instructions();
        let mut progress = Progress::default();

        if let Err(err) = self.close_balanced(store, group, &mut progress) {
            return Err(self.stop(group, err, &instructions, 0, progress));
        }

        for (index, instruction) in instructions.iter().enumerate() {
            if let Some(limit) = self.timeout {
                let elapsed = started.elapsed();
                if elapsed > limit {
                    let err = ExecutionFailure::DeadlineExceeded { elapsed, limit };
                    return Err(self.stop(group, err.into(), &instructions, index, progress));
                }
            }

            let payment = NewPayment {
                from_id: instruction.from.clone(),
                to_id: instruction.to.clone(),
                amount_cents: instruction.amount_cents,
                method: self.payment_method,
                note: instruction.reason.clone(),
            };
            if let Err(err) = store.create_payment(group, payment) {
                return Err(self.stop(group, err.into(), &instructions, index, progress));
            }
            progress.payments_created += 1;
            debug!("group {}: applied {}", group, instruction);

            if let Err(err) = self.close_balanced(store, group, &mut progress) {
                return Err(self.stop(group, err, &instructions, index + 1, progress));
            }
        }

        info!(
            "group {}: settled with {} payments, {} expenses closed, {} payments reconciled",
            group,
            progress.payments_created,
            progress.expenses_settled,
            progress.payments_reconciled
        );
        Ok(ExecutionReport {
            payments_created: progress.payments_created,
            expenses_settled: progress.expenses_settled,
            payments_reconciled: progress.payments_reconciled,
            instructions,
            attributed_expenses,
        })
    }

    /// Close every settlement component whose attendees all net to zero.
    fn close_balanced<S>(
        &self,
        store: &S,
        group: &GroupId,
        progress: &mut Progress,
    ) -> Result<(), StepError>
    where
        S: SettlementStore + ?Sized,
    {
        let expenses = store.list_open_expenses(group)?;
        let payments = store.list_confirmed_payments(group)?;
        let balances = self
            .aggregator
            .aggregate(&expenses, &payments)
            .map_err(StepError::Fatal)?;
        let ledger = balances.ledger();

        for component in settlement_components(&expenses, &payments) {
            if !component.has_records() || !component.is_balanced_in(ledger) {
                continue;
            }
            for expense in &component.expense_ids {
                store.mark_expense_settled(group, expense)?;
                progress.expenses_settled += 1;
            }
            for payment in &component.payment_ids {
                store.mark_payment_reconciled(group, *payment)?;
                progress.payments_reconciled += 1;
            }
            debug!(
                "group {}: closed {} expenses and {} payments among {} attendees",
                group,
                component.expense_ids.len(),
                component.payment_ids.len(),
                component.len()
            );
        }
        Ok(())
    }

    fn stop(
        &self,
        group: &GroupId,
        err: StepError,
        instructions: &[SettlementInstruction],
        applied: usize,
        progress: Progress,
    ) -> EngineError {
        let source = match err {
            StepError::Fatal(err) => return err,
            StepError::Failed(source) => source,
        };
        let partial = PartialSettlement {
            applied: instructions[..applied].to_vec(),
            unapplied: instructions[applied..].to_vec(),
            payments_created: progress.payments_created,
            expenses_settled: progress.expenses_settled,
            payments_reconciled: progress.payments_reconciled,
            source,
        };
        warn!("group {}: {}", group, partial);
        partial.into()
    }
}

/// Failure inside a run: either recoverable by retrying, or a fault that
/// must surface unchanged.
enum StepError {
    Failed(ExecutionFailure),
    Fatal(EngineError),
}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        StepError::Failed(err.into())
    }
}

impl From<ExecutionFailure> for StepError {
    fn from(err: ExecutionFailure) -> Self {
        StepError::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attendee::Attendee;
    use crate::core::expense::{Expense, ExpenseStatus};
    use crate::core::money::Money;
    use crate::core::payment::{Payment, PaymentStatus};
    use crate::execution::memory::{GroupRecord, InMemoryStore};

    fn trip() -> GroupId {
        GroupId::new("trip")
    }

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    fn shared(id: &str, payer: &str, amount: i64, among: [&str; 2]) -> Expense {
        Expense::new(id, payer, cents(amount)).split_evenly(among)
    }

    fn dinner_store() -> InMemoryStore {
        InMemoryStore::new().with_group(
            "trip",
            GroupRecord::new()
                .with_attendee(Attendee::new("alice", "Alice"))
                .with_attendee(Attendee::new("bob", "Bob"))
                .with_attendee(Attendee::new("carol", "Carol"))
                .with_expense(
                    Expense::new("dinner", "alice", cents(9000))
                        .split_evenly(["alice", "bob", "carol"]),
                ),
        )
    }

    #[test]
    fn test_dinner_settles() {
        let store = dinner_store();
        let report = SettlementExecutor::default().execute(&store, &trip()).unwrap();

        assert_eq!(report.payments_created, 2);
        assert_eq!(report.expenses_settled, 1);
        assert_eq!(report.payments_reconciled, 2);

        let record = store.group(&trip()).unwrap();
        assert_eq!(record.expenses[0].status(), ExpenseStatus::Settled);
        assert!(record.payments.iter().all(|p| {
            p.status == PaymentStatus::Reconciled && p.method == PaymentMethod::Settlement
        }));
        assert_eq!(report.attributed_expenses, vec![ExpenseId::new("dinner")]);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let store = dinner_store();
        let executor = SettlementExecutor::default();
        executor.execute(&store, &trip()).unwrap();

        let again = executor.execute(&store, &trip()).unwrap();
        assert_eq!(again.payments_created, 0);
        assert_eq!(again.expenses_settled, 0);
        assert!(again.attributed_expenses.is_empty());
        assert_eq!(store.group(&trip()).unwrap().payments.len(), 2);
    }

    #[test]
    fn test_already_balanced_group_closes_without_payments() {
        let store = InMemoryStore::new().with_group(
            "trip",
            GroupRecord::new()
                .with_expense(shared("e1", "alice", 1000, ["alice", "bob"]))
                .with_payment(Payment::confirmed("bob", "alice", cents(500), PaymentMethod::Cash)),
        );
        let report = SettlementExecutor::default().execute(&store, &trip()).unwrap();

        assert_eq!(report.payments_created, 0);
        assert_eq!(report.expenses_settled, 1);
        assert_eq!(report.payments_reconciled, 1);
    }

    #[test]
    fn test_unrelated_expense_settles_independently() {
        // carol/dave are square; alice/bob still owe.
        let store = InMemoryStore::new().with_group(
            "trip",
            GroupRecord::new()
                .with_expense(shared("e1", "alice", 1000, ["alice", "bob"]))
                .with_expense(shared("e2", "carol", 400, ["carol", "dave"]))
                .with_expense(shared("e3", "dave", 400, ["carol", "dave"])),
        );
        let executor = SettlementExecutor::default();
        let planned = executor.plan(&store, &trip()).unwrap();
        assert_eq!(planned.plan.optimized_count(), 1);

        let report = executor.execute(&store, &trip()).unwrap();
        assert_eq!(report.payments_created, 1);
        assert_eq!(report.expenses_settled, 3);
        // e2 and e3 cancel out and leave no debt behind
        assert_eq!(report.attributed_expenses, vec![ExpenseId::new("e1")]);
    }

    #[test]
    fn test_deadline_reports_partial() {
        let config = EngineConfig {
            execution_timeout_ms: Some(0),
            ..EngineConfig::default()
        };
        let executor = SettlementExecutor::new(SettlementOptimizer::default(), &config);
        let store = dinner_store();

        // A zero deadline may or may not trip before the first instruction;
        // whichever happens, nothing is paid twice and a retry finishes.
        match executor.execute(&store, &trip()) {
            Ok(report) => assert_eq!(report.payments_created, 2),
            Err(EngineError::PartialSettlement(partial)) => {
                assert!(matches!(
                    partial.source,
                    ExecutionFailure::DeadlineExceeded { .. }
                ));
                assert_eq!(partial.applied.len() + partial.unapplied.len(), 2);
                let report = SettlementExecutor::default().execute(&store, &trip()).unwrap();
                assert_eq!(report.payments_created, partial.unapplied.len());
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
