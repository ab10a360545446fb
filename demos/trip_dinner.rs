//! A weekend trip settled end to end.
//!
//! Shows share resolution with an uneven amount, the suggested payments,
//! and what happens when the settlement is applied twice.

use settlement_engine::balance::shares::resolve_shares;
use settlement_engine::config::EngineConfig;
use settlement_engine::core::attendee::{Attendee, GroupId};
use settlement_engine::core::expense::{Expense, Participant};
use settlement_engine::core::money::Money;
use settlement_engine::core::payment::{Payment, PaymentMethod};
use settlement_engine::execution::memory::{GroupRecord, InMemoryStore};
use settlement_engine::service::SettlementService;

fn main() {
    println!("╔════════════════════════════════════════╗");
    println!("║  settlement-engine: Weekend Trip Demo  ║");
    println!("╚════════════════════════════════════════╝\n");

    let dinner = Expense::new("dinner", "alice", Money::from_cents(10001))
        .split_evenly(["alice", "bob", "carol"])
        .with_description("Friday dinner");
    let cabin = Expense::new("cabin", "bob", Money::from_cents(45000))
        .with_participant(Participant::with_share("alice", Money::from_cents(20000)))
        .with_participant(Participant::opted_in("bob"))
        .with_participant(Participant::opted_in("carol"))
        .with_participant(Participant::opted_in("dave"))
        .with_description("Cabin, Alice took the big room");
    let fuel = Expense::new("fuel", "dave", Money::from_cents(6000))
        .split_evenly(["carol", "dave"])
        .with_description("Fuel");

    // --- Shares ---
    println!("━━━ Shares ━━━\n");
    for expense in [&dinner, &cabin, &fuel] {
        println!(
            "{} ({} paid by {}):",
            expense.description().unwrap_or("expense"),
            expense.amount_cents(),
            expense.payer_id()
        );
        match resolve_shares(expense) {
            Ok(shares) => {
                for share in shares {
                    println!("  {:<8} {}", share.attendee_id.as_str(), share.share_cents);
                }
            }
            Err(e) => println!("  invalid: {}", e),
        }
    }
    println!();

    let record = GroupRecord::new()
        .with_attendee(Attendee::new("alice", "Alice"))
        .with_attendee(Attendee::new("bob", "Bob"))
        .with_attendee(Attendee::new("carol", "Carol"))
        .with_attendee(Attendee::new("dave", "Dave"))
        .with_expense(dinner)
        .with_expense(cabin)
        .with_expense(fuel)
        .with_payment(Payment::confirmed(
            "carol",
            "dave",
            Money::from_cents(3000),
            PaymentMethod::Venmo,
        ));

    let group = GroupId::new("weekend");
    let store = InMemoryStore::new().with_group(group.clone(), record);
    let service = SettlementService::new(store, &EngineConfig::default());

    // --- Preview ---
    println!("━━━ Suggested Settlements ━━━\n");
    let view = match service.preview(&group) {
        Ok(view) => view,
        Err(e) => {
            eprintln!("preview failed: {}", e);
            return;
        }
    };
    for entry in &view.settlements {
        println!("  {} pays {} {}", entry.from_name, entry.to_name, entry.amount_cents);
    }
    println!(
        "\n  {} debts → {} payments ({}% fewer)\n",
        view.original_count, view.optimized_count, view.savings_percent
    );

    // --- Settle twice ---
    println!("━━━ Settle ━━━\n");
    for attempt in 1..=2 {
        match service.settle(&group) {
            Ok(report) => println!(
                "  Run {}: {} payments created, {} expenses settled",
                attempt, report.payments_created, report.expenses_settled
            ),
            Err(e) => println!("  Run {}: failed: {}", attempt, e),
        }
    }
}
