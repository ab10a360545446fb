use proptest::prelude::*;
use settlement_engine::balance::aggregator::BalanceAggregator;
use settlement_engine::balance::shares::resolve_shares;
use settlement_engine::config::EngineConfig;
use settlement_engine::core::attendee::{AttendeeId, GroupId};
use settlement_engine::core::expense::{Expense, Participant};
use settlement_engine::core::ledger::Ledger;
use settlement_engine::core::money::Money;
use settlement_engine::core::payment::{Payment, PaymentMethod};
use settlement_engine::execution::memory::{GroupRecord, InMemoryStore};
use settlement_engine::graph::debt_graph::DebtGraph;
use settlement_engine::optimization::optimizer::{SettlementOptimizer, SettlementPlan};
use settlement_engine::service::SettlementService;

/// Attendee ids from a small pool, so expenses overlap.
fn arb_attendee() -> impl Strategy<Value = AttendeeId> {
    prop::sample::select(vec![
        AttendeeId::new("alice"),
        AttendeeId::new("bob"),
        AttendeeId::new("carol"),
        AttendeeId::new("dave"),
        AttendeeId::new("erin"),
        AttendeeId::new("frank"),
    ])
}

/// Amount in cents (0 to 100,000.00).
fn arb_amount() -> impl Strategy<Value = Money> {
    (0i64..10_000_000i64).prop_map(Money::from_cents)
}

/// An expense over a non-empty subset of the pool. Up to two attendees may
/// opt out, and when several remain opted in the first may carry an
/// explicit share of 0 to 100 percent of the amount.
fn arb_expense(index: usize) -> impl Strategy<Value = Expense> {
    (
        arb_attendee(),
        arb_amount(),
        prop::collection::btree_set(arb_attendee(), 1..6),
        prop::collection::btree_set(arb_attendee(), 0..3),
        prop::option::of(0i64..=100i64),
    )
        .prop_map(move |(payer, amount, participants, opted_out, explicit_percent)| {
            let mut expense = Expense::new(format!("e{}", index).as_str(), payer, amount);
            for attendee in &opted_out {
                expense = expense.with_participant(Participant::opted_out(attendee.clone()));
            }

            let opted_in: Vec<&AttendeeId> = participants
                .iter()
                .filter(|attendee| !opted_out.contains(*attendee))
                .collect();
            for (i, attendee) in opted_in.iter().enumerate() {
                let participant = match explicit_percent {
                    // The others absorb whatever the explicit share leaves
                    Some(percent) if i == 0 && opted_in.len() > 1 => Participant::with_share(
                        (*attendee).clone(),
                        Money::from_cents(amount.cents() / 100 * percent),
                    ),
                    _ => Participant::opted_in((*attendee).clone()),
                };
                expense = expense.with_participant(participant);
            }
            expense
        })
}

fn arb_expenses() -> impl Strategy<Value = Vec<Expense>> {
    (0usize..30).prop_flat_map(|n| (0..n).map(arb_expense).collect::<Vec<_>>())
}

/// A confirmed payment between two distinct attendees.
fn arb_payment() -> impl Strategy<Value = Payment> {
    (arb_attendee(), arb_attendee(), 1i64..500_000i64).prop_filter_map(
        "payer must differ from payee",
        |(from, to, amount)| {
            if from == to {
                None
            } else {
                Some(Payment::confirmed(
                    from,
                    to,
                    Money::from_cents(amount),
                    PaymentMethod::Cash,
                ))
            }
        },
    )
}

fn arb_payments() -> impl Strategy<Value = Vec<Payment>> {
    prop::collection::vec(arb_payment(), 0..6)
}

/// Sum each attendee's instructions: received minus paid.
fn instruction_flows(plan: &SettlementPlan) -> Ledger {
    let mut flows = Ledger::new();
    for instruction in plan.instructions() {
        flows.apply_debt(&instruction.from, &instruction.to, instruction.amount_cents);
    }
    flows
}

proptest! {
    // ===================================================================
    // CONSERVATION: net positions always sum to exactly zero.
    // ===================================================================
    #[test]
    fn positions_always_balance(expenses in arb_expenses(), payments in arb_payments()) {
        let balances = BalanceAggregator::default().aggregate(&expenses, &payments).unwrap();
        prop_assert!(balances.ledger().is_balanced());

        let graph = DebtGraph::from_balances(&balances);
        prop_assert_eq!(graph.net_positions().imbalance(), Money::ZERO);
    }

    // ===================================================================
    // Shares add up to the expense amount exactly, and no two equal
    // shares differ by more than one cent.
    // ===================================================================
    #[test]
    fn shares_sum_to_amount(
        amount in arb_amount(),
        participants in prop::collection::btree_set(arb_attendee(), 1..6),
        fixed in prop::option::of((arb_attendee(), 0i64..1_000i64)),
    ) {
        let mut expense = Expense::new("e", "alice", amount);
        let mut equal = Vec::new();
        for attendee in &participants {
            match &fixed {
                Some((who, share)) if who == attendee && participants.len() > 1
                    && *share <= amount.cents() =>
                {
                    expense = expense.with_participant(
                        Participant::with_share(attendee.clone(), Money::from_cents(*share)),
                    );
                }
                _ => {
                    equal.push(attendee.clone());
                    expense = expense.with_participant(Participant::opted_in(attendee.clone()));
                }
            }
        }

        let shares = resolve_shares(&expense).unwrap();
        let total: Money = shares.iter().map(|s| s.share_cents).sum();
        prop_assert_eq!(total, amount);

        let equal_shares: Vec<i64> = shares
            .iter()
            .filter(|s| equal.contains(&s.attendee_id))
            .map(|s| s.share_cents.cents())
            .collect();
        if let (Some(max), Some(min)) = (equal_shares.iter().max(), equal_shares.iter().min()) {
            prop_assert!(max - min <= 1);
        }
    }

    // ===================================================================
    // Instructions reproduce every attendee's net position and move
    // exactly half the sum of absolute positions.
    // ===================================================================
    #[test]
    fn plan_reproduces_positions(expenses in arb_expenses(), payments in arb_payments()) {
        let balances = BalanceAggregator::default().aggregate(&expenses, &payments).unwrap();
        let graph = DebtGraph::from_balances(&balances);
        let plan = SettlementOptimizer::default().optimize(&graph).unwrap();

        let flows = instruction_flows(&plan);
        for (attendee, position) in balances.ledger().all_positions() {
            prop_assert_eq!(flows.position(attendee), *position);
        }

        let absolute: i64 = balances
            .ledger()
            .all_positions()
            .values()
            .map(|m| m.abs().cents())
            .sum();
        prop_assert_eq!(plan.total_moved().cents() * 2, absolute);
    }

    // ===================================================================
    // MINIMALITY BOUND: at most (non-zero positions - 1) payments.
    // ===================================================================
    #[test]
    fn plan_within_bound(expenses in arb_expenses(), payments in arb_payments()) {
        let balances = BalanceAggregator::default().aggregate(&expenses, &payments).unwrap();
        let plan = SettlementOptimizer::default()
            .optimize(&DebtGraph::from_balances(&balances))
            .unwrap();

        let non_zero = balances.ledger().non_zero_count();
        prop_assert!(plan.optimized_count() <= non_zero.saturating_sub(1));
        prop_assert!(plan.instructions().iter().all(|i| i.amount_cents.is_positive()));
    }

    // ===================================================================
    // Applying the plan as payments leaves nothing to settle.
    // ===================================================================
    #[test]
    fn applied_plan_settles_everyone(expenses in arb_expenses(), payments in arb_payments()) {
        let aggregator = BalanceAggregator::default();
        let balances = aggregator.aggregate(&expenses, &payments).unwrap();
        let plan = SettlementOptimizer::default()
            .optimize(&DebtGraph::from_balances(&balances))
            .unwrap();

        let mut all_payments = payments.clone();
        for instruction in plan.instructions() {
            all_payments.push(Payment::confirmed(
                instruction.from.clone(),
                instruction.to.clone(),
                instruction.amount_cents,
                PaymentMethod::Settlement,
            ));
        }

        let after = aggregator.aggregate(&expenses, &all_payments).unwrap();
        prop_assert!(after.ledger().is_settled());
        let replan = SettlementOptimizer::default()
            .optimize(&DebtGraph::from_balances(&after))
            .unwrap();
        prop_assert!(replan.is_empty());
    }

    // ===================================================================
    // DETERMINISM: input order does not change the plan.
    // ===================================================================
    #[test]
    fn plan_ignores_input_order(expenses in arb_expenses(), payments in arb_payments()) {
        let aggregator = BalanceAggregator::default();
        let forward = aggregator.aggregate(&expenses, &payments).unwrap();

        let mut reversed_expenses = expenses.clone();
        reversed_expenses.reverse();
        let mut reversed_payments = payments.clone();
        reversed_payments.reverse();
        let backward = aggregator.aggregate(&reversed_expenses, &reversed_payments).unwrap();

        let optimizer = SettlementOptimizer::default();
        let a = optimizer.optimize(&DebtGraph::from_balances(&forward)).unwrap();
        let b = optimizer.optimize(&DebtGraph::from_balances(&backward)).unwrap();
        prop_assert_eq!(a, b);
    }

    // ===================================================================
    // Execution end to end: after a settle, a second settle does nothing
    // and every expense is closed.
    // ===================================================================
    #[test]
    fn settle_twice_second_is_empty(expenses in arb_expenses(), payments in arb_payments()) {
        let record = GroupRecord {
            attendees: Vec::new(),
            expenses,
            payments,
        };
        let store = InMemoryStore::new().with_group("g", record);
        let service = SettlementService::new(store, &EngineConfig::default());
        let group = GroupId::new("g");

        service.settle(&group).unwrap();
        let again = service.settle(&group).unwrap();
        prop_assert_eq!(again.payments_created, 0);
        prop_assert_eq!(again.expenses_settled, 0);

        let record = service.store().group(&group).unwrap();
        prop_assert!(record.expenses.iter().all(|e| !e.is_open()));
    }
}
