//! Circular debts collapse.
//!
//! Three friends each cover one meal for the next, and carol also buys
//! snacks for the other two. The ring of meals cancels out, so three pairwise
//! debts reduce to two payments: alice and bob each repay carol for snacks.

use settlement_engine::balance::aggregator::BalanceAggregator;
use settlement_engine::core::expense::Expense;
use settlement_engine::core::money::Money;
use settlement_engine::graph::debt_graph::DebtGraph;
use settlement_engine::optimization::optimizer::SettlementOptimizer;

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  settlement-engine: Circular Debts Demo  ║");
    println!("╚══════════════════════════════════════════╝\n");

    let expenses = vec![
        Expense::new("breakfast", "alice", Money::from_cents(2000)).split_evenly(["bob"]),
        Expense::new("lunch", "bob", Money::from_cents(2000)).split_evenly(["carol"]),
        Expense::new("dinner", "carol", Money::from_cents(2000)).split_evenly(["alice"]),
        Expense::new("snacks", "carol", Money::from_cents(900)).split_evenly(["alice", "bob"]),
    ];

    let balances = match BalanceAggregator::default().aggregate(&expenses, &[]) {
        Ok(balances) => balances,
        Err(e) => {
            eprintln!("aggregation failed: {}", e);
            return;
        }
    };
    let graph = DebtGraph::from_balances(&balances);

    println!("Debts:");
    for debt in graph.debts() {
        println!("  {} → {}: {}", debt.debtor, debt.creditor, debt.amount_cents);
    }

    println!("\nNet positions:");
    for (attendee, position) in balances.ledger().all_positions() {
        println!("  {:<6} {}", attendee.as_str(), position);
    }
    println!();

    match SettlementOptimizer::default().optimize(&graph) {
        Ok(plan) => println!("{}", plan),
        Err(e) => eprintln!("optimization failed: {}", e),
    }
}
